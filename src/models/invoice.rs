use crate::models::errors::GatewayError;
use crate::models::InvoiceStatus;
use crate::types::{generate_id, AccountId, Amount, InvoiceId};
use chrono::{DateTime, Utc};

/// Descriptive data a merchant attaches to a charge. None of it affects settlement.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct InvoiceDetails {
    pub description: String,
    pub payment_type: String,
    pub card_last_digits: String
}

/// A single charge tracked from submission to its final status.
///
/// `id`, `account_id` and `amount` never change after creation. `status` only moves
/// through [`Invoice::update_status`].
#[derive(Debug, Clone)]
pub struct Invoice {
    pub id: InvoiceId,
    pub account_id: AccountId,
    pub amount: Amount,
    pub status: InvoiceStatus,
    pub details: InvoiceDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>
}

impl Invoice {
    pub fn new(account_id: &str, amount: Amount, status: InvoiceStatus, details: InvoiceDetails) -> Self {
        let now = Utc::now();

        Self {
            id: generate_id(),
            account_id: account_id.to_string(),
            amount,
            status,
            details,
            created_at: now,
            updated_at: now
        }
    }

    /// Moves the invoice to `status` if the transition is legal.
    ///
    /// Replaying a status the invoice already has, or any move out of a terminal status,
    /// fails with the matching "already" conflict. Moves that skip a step, such as
    /// `pending` to `settled`, fail with `TransactionNotAllowed`. A failed call leaves the
    /// invoice unchanged.
    pub fn update_status(&mut self, status: InvoiceStatus) -> Result<(), GatewayError> {
        let replayed = status == self.status && !self.is_pending();

        if replayed || self.status.is_terminal() {
            return Err(GatewayError::already_processed(self))
        }

        if !self.status.successors().contains(&status) {
            // Approved cannot be rejected afterwards, the review outcome is already in.
            if status == InvoiceStatus::Rejected {
                return Err(GatewayError::already_processed(self))
            }

            return Err(GatewayError::not_allowed(self, status))
        }

        self.status = status;
        self.updated_at = Utc::now();

        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvoiceStatus::Pending
    }
}
