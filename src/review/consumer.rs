use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::select;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::broker::{Message, MessageSubscriber};
use crate::ledger::Ledger;
use crate::models::{ErrorKind, GatewayError, InvoiceStatus};
use crate::review::TransactionResultEvent;
use crate::storage::InvoiceRepository;
use crate::types::{AccountId, InvoiceId};

const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// What applying one review result did.
#[derive(Debug)]
pub enum ReviewOutcome {
    /// The invoice was approved and its amount credited to the owning account.
    Credited {
        invoice_id: InvoiceId,
        account_id: AccountId,
        balance: Decimal
    },
    /// The invoice was approved but the credit failed. Reconciliation picks it up.
    CreditDeferred {
        invoice_id: InvoiceId,
        error: GatewayError
    },
    /// The invoice moved to a status with no ledger effect.
    StatusUpdated {
        invoice_id: InvoiceId,
        status: InvoiceStatus
    }
}

/// Drains review results and drives invoices and the ledger to their outcome.
///
/// Every failure is logged and the record dropped; nothing in here stops the loop except
/// the stop signal or the end of the subscription.
pub struct FraudReviewConsumer {
    subscriber: Box<dyn MessageSubscriber>,
    invoices: Arc<dyn InvoiceRepository>,
    ledger: Arc<Ledger>
}

impl FraudReviewConsumer {
    pub fn new(subscriber: Box<dyn MessageSubscriber>, invoices: Arc<dyn InvoiceRepository>, ledger: Arc<Ledger>) -> Self {
        Self {
            subscriber,
            invoices,
            ledger
        }
    }

    /// Consumes until `stop` is raised (or its sender dropped) or the subscription ends,
    /// then closes the subscription. A record that is being applied when the stop arrives
    /// is finished first.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> Result<(), GatewayError> {
        info!("Review consumer started");

        loop {
            let received = select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                received = self.subscriber.next_message() => received
            };

            match received {
                Ok(Some(message)) => self.process(&message),
                Ok(None) => {
                    info!("Review subscription ended");
                    break;
                }
                Err(error) => {
                    error!("Receiving review result failed: {error}");
                    sleep(RECEIVE_RETRY_DELAY).await;
                }
            }
        }

        self.subscriber.close().await?;

        info!("Review consumer stopped");

        Ok(())
    }

    /// Applies one record and logs the result.
    pub fn process(&self, message: &Message) {
        match self.handle(&message.payload) {
            Ok(ReviewOutcome::Credited { invoice_id, account_id, balance }) => {
                info!("Invoice [{invoice_id}] approved, account [{account_id}] balance is now [{balance}]");
            }
            Ok(ReviewOutcome::CreditDeferred { invoice_id, error }) => {
                warn!("Invoice [{invoice_id}] approved but not credited, left for reconciliation: {error}");
            }
            Ok(ReviewOutcome::StatusUpdated { invoice_id, status }) => {
                info!("Invoice [{invoice_id}] moved to [{status}]");
            }
            Err(error) => match error.kind() {
                ErrorKind::Conflict => info!("Ignoring replayed review result [{}]: {error}", message.key),
                ErrorKind::Transport => error!("Review result [{}] failed: {error}", message.key),
                _ => warn!("Dropping review result [{}]: {error}", message.key)
            }
        }
    }

    /// Applies one raw review result.
    ///
    /// # Errors
    /// `MalformedEvent` for undecodable payloads, `InvalidStatus` for statuses outside the
    /// closed set, `InvoiceNotFound`, and the state machine's conflicts when the result
    /// is a duplicate or arrives out of order. Ledger failures are not errors here; they
    /// are reported as [`ReviewOutcome::CreditDeferred`].
    pub fn handle(&self, payload: &[u8]) -> Result<ReviewOutcome, GatewayError> {
        let event = TransactionResultEvent::from_bytes(payload)?;
        let status = event.status()?;
        let invoice = self.invoices.update_status(&event.invoice_id, status)?;

        if invoice.status != InvoiceStatus::Approved {
            return Ok(ReviewOutcome::StatusUpdated { invoice_id: invoice.id, status: invoice.status })
        }

        match self.ledger.settle(&invoice.account_id, &invoice.id, invoice.amount) {
            Ok(account) => Ok(ReviewOutcome::Credited {
                invoice_id: invoice.id,
                account_id: account.id,
                balance: account.balance
            }),
            // Reconciliation got there first.
            Err(GatewayError::DuplicateSettlement { .. }) => Ok(ReviewOutcome::StatusUpdated {
                invoice_id: invoice.id,
                status: invoice.status
            }),
            Err(error) => Ok(ReviewOutcome::CreditDeferred { invoice_id: invoice.id, error })
        }
    }
}

async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}
