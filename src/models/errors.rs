use crate::models::{Invoice, InvoiceStatus};
use crate::types::{AccountId, AmountError, InvoiceId};
use thiserror::Error;

/// Coarse classification of a [`GatewayError`], used to decide how a failure surfaces.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    Transport,
    InvalidStatus,
    Unauthorized
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Account [{account_id}] was not found")]
    AccountNotFound {
        account_id: AccountId
    },
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Account API key is already in use")]
    AccountDuplicateKey,
    #[error("Balance of account [{account_id}] cannot absorb the change without overflowing")]
    BalanceOverflow {
        account_id: AccountId
    },
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
    #[error("Invoice [{invoice_id}] was not found")]
    InvoiceNotFound {
        invoice_id: InvoiceId
    },
    #[error("Invoice [{invoice_id}] already exists")]
    InvoiceAlreadyExists {
        invoice_id: InvoiceId
    },
    #[error("Invoice [{invoice_id}] does not belong to the requesting account")]
    UnauthorizedAccess {
        invoice_id: InvoiceId
    },
    #[error("Unknown invoice status [{0}]")]
    InvalidStatus(String),
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
    #[error("Transaction [{invoice_id}] is already approved")]
    TransactionAlreadyApproved {
        invoice_id: InvoiceId
    },
    #[error("Transaction [{invoice_id}] was already processed as [{status}]")]
    TransactionAlreadyProcessed {
        invoice_id: InvoiceId,
        status: InvoiceStatus
    },
    #[error("Transaction [{invoice_id}] is already cancelled")]
    TransactionAlreadyCancelled {
        invoice_id: InvoiceId
    },
    #[error("Transaction [{invoice_id}] is already refunded")]
    TransactionAlreadyRefunded {
        invoice_id: InvoiceId
    },
    #[error("Transaction [{invoice_id}] is already reversed")]
    TransactionAlreadyReversed {
        invoice_id: InvoiceId
    },
    #[error("Transaction [{invoice_id}] is already charged back")]
    TransactionAlreadyChargedBack {
        invoice_id: InvoiceId
    },
    #[error("Transaction [{invoice_id}] is already settled")]
    TransactionAlreadySettled {
        invoice_id: InvoiceId
    },
    #[error("Transaction [{invoice_id}] is already disputed")]
    TransactionAlreadyDisputed {
        invoice_id: InvoiceId
    },
    #[error("Transaction [{invoice_id}] cannot move from [{from}] to [{to}]")]
    TransactionNotAllowed {
        invoice_id: InvoiceId,
        from: InvoiceStatus,
        to: InvoiceStatus
    },
    #[error("Invoice [{invoice_id}] was already settled against account [{account_id}]")]
    DuplicateSettlement {
        account_id: AccountId,
        invoice_id: InvoiceId
    },
    #[error("Publishing invoice [{invoice_id}] for review failed: {reason}")]
    PublishFailed {
        invoice_id: InvoiceId,
        reason: String
    },
    #[error("Transport error: {0}")]
    Transport(String)
}

impl GatewayError {
    pub fn account_not_found(account_id: &str) -> Self {
        Self::AccountNotFound { account_id: account_id.to_string() }
    }

    pub fn balance_overflow(account_id: &str) -> Self {
        Self::BalanceOverflow { account_id: account_id.to_string() }
    }

    pub fn invoice_not_found(invoice_id: &str) -> Self {
        Self::InvoiceNotFound { invoice_id: invoice_id.to_string() }
    }

    pub fn duplicate_settlement(account_id: &str, invoice_id: &str) -> Self {
        Self::DuplicateSettlement {
            account_id: account_id.to_string(),
            invoice_id: invoice_id.to_string()
        }
    }

    /// The conflict raised when `invoice` has already reached its current status and
    /// cannot accept another transition out of it.
    pub fn already_processed(invoice: &Invoice) -> Self {
        let invoice_id = invoice.id.clone();

        match invoice.status {
            InvoiceStatus::Approved => Self::TransactionAlreadyApproved { invoice_id },
            InvoiceStatus::Cancelled => Self::TransactionAlreadyCancelled { invoice_id },
            InvoiceStatus::Refunded => Self::TransactionAlreadyRefunded { invoice_id },
            InvoiceStatus::Reversed => Self::TransactionAlreadyReversed { invoice_id },
            InvoiceStatus::ChargedBack => Self::TransactionAlreadyChargedBack { invoice_id },
            InvoiceStatus::Settled => Self::TransactionAlreadySettled { invoice_id },
            InvoiceStatus::Disputed => Self::TransactionAlreadyDisputed { invoice_id },
            status => Self::TransactionAlreadyProcessed { invoice_id, status }
        }
    }

    pub fn not_allowed(invoice: &Invoice, to: InvoiceStatus) -> Self {
        Self::TransactionNotAllowed {
            invoice_id: invoice.id.clone(),
            from: invoice.status,
            to
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound { .. }
            | Self::InvalidApiKey
            | Self::InvoiceNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidAmount(_)
            | Self::BalanceOverflow { .. }
            | Self::MalformedEvent(_) => ErrorKind::InvalidInput,
            Self::InvalidStatus(_) => ErrorKind::InvalidStatus,
            Self::UnauthorizedAccess { .. } => ErrorKind::Unauthorized,
            Self::PublishFailed { .. }
            | Self::Transport(_) => ErrorKind::Transport,
            Self::AccountDuplicateKey
            | Self::InvoiceAlreadyExists { .. }
            | Self::TransactionAlreadyApproved { .. }
            | Self::TransactionAlreadyProcessed { .. }
            | Self::TransactionAlreadyCancelled { .. }
            | Self::TransactionAlreadyRefunded { .. }
            | Self::TransactionAlreadyReversed { .. }
            | Self::TransactionAlreadyChargedBack { .. }
            | Self::TransactionAlreadySettled { .. }
            | Self::TransactionAlreadyDisputed { .. }
            | Self::TransactionNotAllowed { .. }
            | Self::DuplicateSettlement { .. } => ErrorKind::Conflict
        }
    }
}
