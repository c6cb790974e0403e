use std::sync::Arc;

use tracing::info;

use crate::actors::{ReviewWorker, ReviewWorkerHandle};
use crate::broker::{MessagePublisher, MessageSubscriber};
use crate::config::GatewayConfig;
use crate::engine::SettlementEngine;
use crate::ledger::Ledger;
use crate::review::{FraudReviewConsumer, FraudReviewProducer};
use crate::storage::{AccountStorage, InvoiceStorage};

/// A fully wired gateway: in-memory repositories, the settlement engine and a running
/// review worker.
pub struct Gateway {
    pub engine: Arc<SettlementEngine>,
    worker: ReviewWorkerHandle
}

impl Gateway {
    /// Wires the components and starts consuming review results from `subscriber`.
    pub fn start(config: &GatewayConfig, publisher: Arc<dyn MessagePublisher>, subscriber: Box<dyn MessageSubscriber>) -> Self {
        let ledger = Arc::new(Ledger::new(Arc::new(AccountStorage::new()), config.api_key_cache_capacity));
        let invoices = Arc::new(InvoiceStorage::new());
        let producer = Arc::new(FraudReviewProducer::new(publisher, &config.broker));

        let engine = Arc::new(SettlementEngine::new(ledger.clone(), invoices.clone(), producer, config));
        let worker = ReviewWorker::spawn(FraudReviewConsumer::new(subscriber, invoices, ledger));

        info!(
            "Gateway started against [{}], reviewing [{}], results from [{}] as [{}]",
            config.broker.address,
            config.broker.pending_transactions_topic,
            config.broker.transaction_results_topic,
            config.broker.consumer_group
        );

        Self { engine, worker }
    }

    /// Stops the review worker right away and releases the producer.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.worker.stop().await?;
        self.engine.shutdown().await?;
        Ok(())
    }

    /// Lets the review worker finish its subscription, then reconciles and releases the
    /// producer. The subscription must be ending (e.g. broker closed) or this never returns.
    pub async fn drain(self) -> anyhow::Result<usize> {
        self.worker.join().await?;
        let repaired = self.engine.reconcile();
        self.engine.shutdown().await?;
        Ok(repaired)
    }
}
