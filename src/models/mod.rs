mod account;
mod errors;
mod invoice;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub use account::Account;
pub use errors::{ErrorKind, GatewayError};
pub use invoice::{Invoice, InvoiceDetails};

/// The closed set of states an invoice can be in.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
    Reversed,
    ChargedBack,
    Settled,
    Disputed
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 9] = [
        InvoiceStatus::Pending,
        InvoiceStatus::Approved,
        InvoiceStatus::Rejected,
        InvoiceStatus::Cancelled,
        InvoiceStatus::Refunded,
        InvoiceStatus::Reversed,
        InvoiceStatus::ChargedBack,
        InvoiceStatus::Settled,
        InvoiceStatus::Disputed
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Rejected => "rejected",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Refunded => "refunded",
            InvoiceStatus::Reversed => "reversed",
            InvoiceStatus::ChargedBack => "charged_back",
            InvoiceStatus::Settled => "settled",
            InvoiceStatus::Disputed => "disputed"
        }
    }

    /// Whether an invoice in this status has had its amount credited to the owning
    /// account. Refinements of an approval keep the credit, debits are not modelled.
    pub fn is_credited(&self) -> bool {
        !matches!(self, InvoiceStatus::Pending | InvoiceStatus::Rejected)
    }

    /// Statuses an invoice may move to from this one.
    pub fn successors(&self) -> &'static [InvoiceStatus] {
        match self {
            InvoiceStatus::Pending => &[InvoiceStatus::Approved, InvoiceStatus::Rejected],
            InvoiceStatus::Approved => &[
                InvoiceStatus::Settled,
                InvoiceStatus::Cancelled,
                InvoiceStatus::Refunded,
                InvoiceStatus::Reversed,
                InvoiceStatus::ChargedBack,
                InvoiceStatus::Disputed
            ],
            InvoiceStatus::Settled => &[
                InvoiceStatus::Refunded,
                InvoiceStatus::Reversed,
                InvoiceStatus::ChargedBack,
                InvoiceStatus::Disputed
            ],
            _ => &[]
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = GatewayError;

    /// Parses the wire form of a status. Anything outside the closed set is rejected.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL.into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| GatewayError::InvalidStatus(value.to_string()))
    }
}
