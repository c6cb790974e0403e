use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::broker::MessagePublisher;
use crate::config::BrokerConfig;
use crate::models::GatewayError;
use crate::review::PendingTransactionEvent;

/// Publishes pending high-value transactions to the review topic.
///
/// Failures are returned to the caller as `PublishFailed`; there is no internal retry.
pub struct FraudReviewProducer {
    publisher: Arc<dyn MessagePublisher>,
    topic: String,
    closed: AtomicBool
}

impl FraudReviewProducer {
    pub fn new(publisher: Arc<dyn MessagePublisher>, config: &BrokerConfig) -> Self {
        Self {
            publisher,
            topic: config.pending_transactions_topic.clone(),
            closed: AtomicBool::new(false)
        }
    }

    pub async fn publish(&self, event: &PendingTransactionEvent) -> Result<(), GatewayError> {
        let publish_failed = |error: GatewayError| GatewayError::PublishFailed {
            invoice_id: event.invoice_id.clone(),
            reason: error.to_string()
        };

        let payload = event.to_bytes().map_err(publish_failed)?;

        self.publisher.publish(&self.topic, &event.invoice_id, payload).await
            .map_err(publish_failed)?;

        info!(
            topic = %self.topic,
            invoice_id = %event.invoice_id,
            account_id = %event.account_id,
            amount = %event.amount,
            "Pending transaction published for review"
        );

        Ok(())
    }

    /// Flushes and releases the publisher. Only the first call reaches the broker.
    pub async fn close(&self) -> Result<(), GatewayError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(())
        }

        debug!("Closing review producer for [{}]", self.topic);

        self.publisher.close().await
    }
}
