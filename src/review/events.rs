use serde::{Deserialize, Serialize};

use crate::models::{GatewayError, Invoice, InvoiceStatus};
use crate::types::{AccountId, Amount, InvoiceId};

/// Snapshot of a high-value invoice sent to the anti-fraud service.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PendingTransactionEvent {
    pub account_id: AccountId,
    pub invoice_id: InvoiceId,
    pub amount: Amount
}

impl PendingTransactionEvent {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        Self {
            account_id: invoice.account_id.clone(),
            invoice_id: invoice.id.clone(),
            amount: invoice.amount
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GatewayError> {
        serde_json::to_vec(self).map_err(|error| GatewayError::MalformedEvent(error.to_string()))
    }

    #[cfg(test)]
    pub fn from_bytes(payload: &[u8]) -> Result<Self, GatewayError> {
        serde_json::from_slice(payload).map_err(|error| GatewayError::MalformedEvent(error.to_string()))
    }
}

/// Verdict of the anti-fraud service for one invoice.
///
/// `status` is kept as the raw wire string; [`TransactionResultEvent::status`] is the
/// only way to turn it into an [`InvoiceStatus`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionResultEvent {
    pub invoice_id: InvoiceId,
    pub status: String
}

impl TransactionResultEvent {
    /// Builds a verdict as the anti-fraud service sends it. `status` is not checked here.
    pub fn new(invoice_id: &str, status: &str) -> Self {
        Self {
            invoice_id: invoice_id.to_string(),
            status: status.to_string()
        }
    }

    pub fn status(&self) -> Result<InvoiceStatus, GatewayError> {
        self.status.parse()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GatewayError> {
        serde_json::to_vec(self).map_err(|error| GatewayError::MalformedEvent(error.to_string()))
    }

    pub fn from_bytes(payload: &[u8]) -> Result<Self, GatewayError> {
        serde_json::from_slice(payload).map_err(|error| GatewayError::MalformedEvent(error.to_string()))
    }
}
