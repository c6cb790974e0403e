use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::ledger::Ledger;
use crate::models::{Account, GatewayError, Invoice, InvoiceDetails, InvoiceStatus};
use crate::review::{FraudReviewProducer, PendingTransactionEvent};
use crate::storage::InvoiceRepository;
use crate::types::Amount;

/// Decides, per submitted charge, between immediate settlement and fraud review.
///
/// Charges up to the high-value threshold are approved and credited inline. Anything
/// above is stored as `pending` and handed to the review producer; its outcome is applied
/// later by the review consumer and can be observed through the invoice queries.
pub struct SettlementEngine {
    ledger: Arc<Ledger>,
    invoices: Arc<dyn InvoiceRepository>,
    producer: Arc<FraudReviewProducer>,
    high_value_threshold: Decimal
}

impl SettlementEngine {
    pub fn new(ledger: Arc<Ledger>, invoices: Arc<dyn InvoiceRepository>, producer: Arc<FraudReviewProducer>, config: &GatewayConfig) -> Self {
        Self {
            ledger,
            invoices,
            producer,
            high_value_threshold: config.high_value_threshold
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub async fn submit(&self, account_id: &str, amount: Decimal) -> Result<Invoice, GatewayError> {
        self.submit_with_details(account_id, amount, InvoiceDetails::default()).await
    }

    /// Submits a charge of `amount` against `account_id`.
    ///
    /// # Errors
    /// - `InvalidAmount` if the amount is not positive or has more than two decimals.
    /// - `AccountNotFound` if the account does not exist.
    /// - `PublishFailed` if a high-value invoice could not be sent for review. The
    ///   invoice stays stored as `pending` and can be sent again with [`republish`].
    ///
    /// [`republish`]: SettlementEngine::republish
    pub async fn submit_with_details(&self, account_id: &str, amount: Decimal, details: InvoiceDetails) -> Result<Invoice, GatewayError> {
        let amount = Amount::new(amount)?;
        let account = self.ledger.find_by_id(account_id)?;

        if amount.value() <= self.high_value_threshold {
            self.settle_now(&account, amount, details)
        } else {
            self.hold_for_review(&account, amount, details).await
        }
    }

    /// Approves and credits in one step: the credit is applied first and taken back if
    /// the invoice cannot be recorded, so neither survives without the other.
    fn settle_now(&self, account: &Account, amount: Amount, details: InvoiceDetails) -> Result<Invoice, GatewayError> {
        let invoice = Invoice::new(&account.id, amount, InvoiceStatus::Approved, details);

        self.ledger.settle(&account.id, &invoice.id, amount)?;

        if let Err(error) = self.invoices.save(invoice.clone()) {
            if let Err(reverse_error) = self.ledger.reverse(&account.id, &invoice.id) {
                error!("Could not reverse credit of unrecorded invoice [{}]: {reverse_error}", invoice.id);
            }

            return Err(error)
        }

        info!("Invoice [{}] of [{amount}] approved for account [{}]", invoice.id, account.id);

        Ok(invoice)
    }

    async fn hold_for_review(&self, account: &Account, amount: Amount, details: InvoiceDetails) -> Result<Invoice, GatewayError> {
        let invoice = Invoice::new(&account.id, amount, InvoiceStatus::Pending, details);
        self.invoices.save(invoice.clone())?;

        info!("Invoice [{}] of [{amount}] held for fraud review", invoice.id);

        self.publish(&invoice).await?;

        Ok(invoice)
    }

    async fn publish(&self, invoice: &Invoice) -> Result<(), GatewayError> {
        self.producer.publish(&PendingTransactionEvent::from_invoice(invoice)).await
            .inspect_err(|error| warn!("Invoice [{}] stays pending without review: {error}", invoice.id))
    }

    /// Sends a `pending` invoice to review again, for callers retrying a failed publish.
    pub async fn republish(&self, invoice_id: &str) -> Result<Invoice, GatewayError> {
        let invoice = self.find_invoice(invoice_id)?;

        if !invoice.is_pending() {
            return Err(GatewayError::already_processed(&invoice))
        }

        self.publish(&invoice).await?;

        Ok(invoice)
    }

    pub fn find_invoice(&self, invoice_id: &str) -> Result<Invoice, GatewayError> {
        self.invoices.find_by_id(invoice_id)
            .ok_or_else(|| GatewayError::invoice_not_found(invoice_id))
    }

    /// Looks up an invoice on behalf of the account that owns `api_key`.
    pub async fn find_invoice_for_api_key(&self, api_key: &str, invoice_id: &str) -> Result<Invoice, GatewayError> {
        let account = self.ledger.find_by_api_key(api_key).await?;
        let invoice = self.find_invoice(invoice_id)?;

        if invoice.account_id != account.id {
            return Err(GatewayError::UnauthorizedAccess { invoice_id: invoice.id })
        }

        Ok(invoice)
    }

    pub fn list_invoices(&self, account_id: &str) -> Result<Vec<Invoice>, GatewayError> {
        let account = self.ledger.find_by_id(account_id)?;
        Ok(self.invoices.find_by_account_id(&account.id))
    }

    /// Credits every approved invoice whose credit never landed and returns how many were
    /// repaired. Safe to run at any time: settlement is idempotent per invoice.
    pub fn reconcile(&self) -> usize {
        let credited: Vec<InvoiceStatus> = InvoiceStatus::ALL.into_iter()
            .filter(InvoiceStatus::is_credited)
            .collect();

        let mut repaired = 0;

        for invoice in self.invoices.find_by_status(&credited) {
            if self.ledger.is_settled(&invoice.account_id, &invoice.id) {
                continue;
            }

            match self.ledger.settle(&invoice.account_id, &invoice.id, invoice.amount) {
                Ok(account) => {
                    repaired += 1;
                    info!("Reconciled invoice [{}], account [{}] balance is now [{}]", invoice.id, account.id, account.balance);
                }
                // Credited by the review consumer since the check above.
                Err(GatewayError::DuplicateSettlement { .. }) => {}
                Err(error) => warn!("Invoice [{}] is still not credited: {error}", invoice.id)
            }
        }

        repaired
    }

    /// Releases the review producer. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), GatewayError> {
        self.producer.close().await
    }
}
