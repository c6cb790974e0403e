use super::{BatchRunner, Gateway, SettlementEngine};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::{sleep, timeout};

use crate::broker::{InMemoryBroker, MessagePublisher};
use crate::config::GatewayConfig;
use crate::ledger::Ledger;
use crate::models::{Account, ErrorKind, GatewayError, InvoiceDetails, InvoiceStatus};
use crate::review::{FraudReviewConsumer, FraudReviewProducer, PendingTransactionEvent, TransactionResultEvent};
use crate::storage::{AccountStorage, InvoiceRepository, InvoiceStorage};

/// Publisher whose transport can be switched off.
struct FlakyPublisher {
    inner: Box<dyn MessagePublisher>,
    down: AtomicBool
}

#[async_trait]
impl MessagePublisher for FlakyPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), GatewayError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("broker unreachable".to_string()))
        }

        self.inner.publish(topic, key, payload).await
    }

    async fn close(&self) -> Result<(), GatewayError> {
        self.inner.close().await
    }
}

struct Fixture {
    broker: InMemoryBroker,
    publisher: Arc<FlakyPublisher>,
    ledger: Arc<Ledger>,
    invoices: Arc<InvoiceStorage>,
    engine: SettlementEngine,
    account: Account
}

impl Fixture {
    fn new() -> Result<Self> {
        let config = GatewayConfig::default();
        let broker = InMemoryBroker::new("memory://test");
        let publisher = Arc::new(FlakyPublisher { inner: Box::new(broker.publisher()), down: AtomicBool::new(false) });
        let ledger = Arc::new(Ledger::new(Arc::new(AccountStorage::new()), 100));
        let invoices = Arc::new(InvoiceStorage::new());
        let producer = Arc::new(FraudReviewProducer::new(publisher.clone(), &config.broker));
        let engine = SettlementEngine::new(ledger.clone(), invoices.clone(), producer, &config);
        let account = ledger.create_account("Merchant", "merchant@example.com")?;

        Ok(Self { broker, publisher, ledger, invoices, engine, account })
    }

    fn consumer(&self) -> FraudReviewConsumer {
        FraudReviewConsumer::new(
            Box::new(self.broker.subscribe("transactions_result", "gateway")),
            self.invoices.clone(),
            self.ledger.clone()
        )
    }

    fn balance(&self) -> Result<Decimal> {
        Ok(self.ledger.find_by_id(&self.account.id)?.balance)
    }

    fn pending_events(&self) -> Result<Vec<PendingTransactionEvent>> {
        self.broker.messages("pending_transactions").iter()
            .map(|message| Ok(PendingTransactionEvent::from_bytes(&message.payload)?))
            .collect()
    }
}

fn approval(invoice_id: &str) -> Result<Vec<u8>> {
    Ok(TransactionResultEvent::new(invoice_id, InvoiceStatus::Approved.as_str()).to_bytes()?)
}

#[tokio::test]
async fn test_small_amount_settles_synchronously() -> Result<()> {
    let fixture = Fixture::new()?;

    let invoice = fixture.engine.submit(&fixture.account.id, dec!(500)).await?;

    assert_eq!(invoice.status, InvoiceStatus::Approved);
    assert_eq!(fixture.balance()?, dec!(500));
    assert!(fixture.pending_events()?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_threshold_amount_is_still_synchronous() -> Result<()> {
    let fixture = Fixture::new()?;

    for amount in [dec!(0.01), dec!(9999.99), dec!(10000)] {
        let before = fixture.balance()?;
        let invoice = fixture.engine.submit(&fixture.account.id, amount).await?;

        assert_eq!(invoice.status, InvoiceStatus::Approved);
        assert_eq!(fixture.balance()? - before, amount);
    }

    Ok(())
}

#[tokio::test]
async fn test_large_amount_is_held_and_published() -> Result<()> {
    let fixture = Fixture::new()?;

    let invoice = fixture.engine.submit(&fixture.account.id, dec!(15000)).await?;
    let events = fixture.pending_events()?;

    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert!(fixture.balance()?.is_zero());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].invoice_id, invoice.id);
    assert_eq!(events[0].account_id, fixture.account.id);
    assert_eq!(events[0].amount.value(), dec!(15000));

    Ok(())
}

#[tokio::test]
async fn test_sub_cent_amounts_are_accepted_as_given() -> Result<()> {
    let fixture = Fixture::new()?;

    let small = fixture.engine.submit(&fixture.account.id, dec!(10.005)).await?;
    let large = fixture.engine.submit(&fixture.account.id, dec!(10000.001)).await?;

    assert_eq!(small.status, InvoiceStatus::Approved);
    assert_eq!(small.amount.value(), dec!(10.005));
    assert_eq!(fixture.balance()?, dec!(10.005));
    assert!(large.is_pending());
    assert_eq!(fixture.pending_events()?[0].amount.value(), dec!(10000.001));

    Ok(())
}

#[tokio::test]
async fn test_just_above_threshold_goes_to_review() -> Result<()> {
    let fixture = Fixture::new()?;

    let invoice = fixture.engine.submit(&fixture.account.id, dec!(10000.01)).await?;

    assert!(invoice.is_pending());
    assert!(fixture.balance()?.is_zero());

    Ok(())
}

#[tokio::test]
async fn test_submit_rejects_bad_input() -> Result<()> {
    let fixture = Fixture::new()?;

    let unknown = fixture.engine.submit("missing", dec!(10)).await;
    let zero = fixture.engine.submit(&fixture.account.id, Decimal::ZERO).await;
    let negative = fixture.engine.submit(&fixture.account.id, dec!(-20)).await;

    assert!(matches!(unknown, Err(GatewayError::AccountNotFound { .. })));
    assert!(matches!(zero, Err(GatewayError::InvalidAmount(_))));
    assert_eq!(negative.err().map(|error| error.kind()), Some(ErrorKind::InvalidInput));
    assert!(fixture.invoices.find_by_account_id(&fixture.account.id).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_publish_failure_keeps_the_pending_invoice() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.publisher.down.store(true, Ordering::SeqCst);

    let result = fixture.engine.submit(&fixture.account.id, dec!(15000)).await;

    let invoice_id = match result {
        Err(GatewayError::PublishFailed { invoice_id, .. }) => invoice_id,
        other => return Err(anyhow!("Expected a publish failure, got {other:?}"))
    };

    assert_eq!(fixture.engine.find_invoice(&invoice_id)?.status, InvoiceStatus::Pending);
    assert!(fixture.pending_events()?.is_empty());

    fixture.publisher.down.store(false, Ordering::SeqCst);
    fixture.engine.republish(&invoice_id).await?;

    assert_eq!(fixture.pending_events()?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_republish_refuses_decided_invoices() -> Result<()> {
    let fixture = Fixture::new()?;
    let invoice = fixture.engine.submit(&fixture.account.id, dec!(100)).await?;

    let result = fixture.engine.republish(&invoice.id).await;

    assert!(matches!(result, Err(GatewayError::TransactionAlreadyApproved { .. })));
    assert!(matches!(fixture.engine.republish("missing").await, Err(GatewayError::InvoiceNotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_approved_review_credits_exactly_once() -> Result<()> {
    let fixture = Fixture::new()?;
    let consumer = fixture.consumer();
    let invoice = fixture.engine.submit(&fixture.account.id, dec!(15000)).await?;

    consumer.handle(&approval(&invoice.id)?)?;
    assert!(consumer.handle(&approval(&invoice.id)?).is_err());

    assert_eq!(fixture.balance()?, dec!(15000));
    assert_eq!(fixture.engine.find_invoice(&invoice.id)?.status, InvoiceStatus::Approved);

    Ok(())
}

#[tokio::test]
async fn test_invoice_queries_check_ownership() -> Result<()> {
    let fixture = Fixture::new()?;
    let other = fixture.ledger.create_account("Other", "other@example.com")?;
    let invoice = fixture.engine
        .submit_with_details(&fixture.account.id, dec!(42), InvoiceDetails {
            description: "Monthly plan".to_string(),
            payment_type: "credit_card".to_string(),
            card_last_digits: "4242".to_string()
        })
        .await?;

    let owned = fixture.engine.find_invoice_for_api_key(&fixture.account.api_key, &invoice.id).await?;
    let foreign = fixture.engine.find_invoice_for_api_key(&other.api_key, &invoice.id).await;

    assert_eq!(owned.details.card_last_digits, "4242");
    assert!(matches!(foreign, Err(GatewayError::UnauthorizedAccess { .. })));
    assert_eq!(fixture.engine.list_invoices(&fixture.account.id)?.len(), 1);
    assert!(fixture.engine.list_invoices(&other.id)?.is_empty());
    assert!(matches!(fixture.engine.list_invoices("missing"), Err(GatewayError::AccountNotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_reconcile_credits_approvals_whose_credit_was_lost() -> Result<()> {
    let fixture = Fixture::new()?;
    let settled_inline = fixture.engine.submit(&fixture.account.id, dec!(300)).await?;
    let reviewed = fixture.engine.submit(&fixture.account.id, dec!(15000)).await?;

    // Approved behind the ledger's back, as if the credit had failed.
    fixture.invoices.update_status(&reviewed.id, InvoiceStatus::Approved)?;

    assert_eq!(fixture.balance()?, dec!(300));
    assert_eq!(fixture.engine.reconcile(), 1);
    assert_eq!(fixture.engine.reconcile(), 0);
    assert_eq!(fixture.balance()?, dec!(15300));
    assert!(fixture.ledger.find_by_id(&fixture.account.id)?.is_settled(&settled_inline.id));

    Ok(())
}

#[tokio::test]
async fn test_shutdown_is_idempotent() -> Result<()> {
    let fixture = Fixture::new()?;

    fixture.engine.shutdown().await?;
    fixture.engine.shutdown().await?;

    let result = fixture.engine.submit(&fixture.account.id, dec!(20000)).await;

    assert_eq!(result.err().map(|error| error.kind()), Some(ErrorKind::Transport));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gateway_pipeline_races_sync_and_async_settlement() -> Result<()> {
    let config = GatewayConfig::default();
    let broker = InMemoryBroker::new("memory://test");
    let gateway = Gateway::start(
        &config,
        Arc::new(broker.publisher()),
        Box::new(broker.subscribe(&config.broker.transaction_results_topic, &config.broker.consumer_group))
    );
    let engine = gateway.engine.clone();
    let account = engine.ledger().create_account("Merchant", "merchant@example.com")?;
    let reviewer = broker.publisher();

    let mut expected = Decimal::ZERO;

    for index in 1..=20 {
        let small = engine.submit(&account.id, Decimal::from(index)).await?;
        let large = engine.submit(&account.id, Decimal::from(10_000 + index)).await?;

        reviewer.publish(&config.broker.transaction_results_topic, &large.id, approval(&large.id)?).await?;
        reviewer.publish(&config.broker.transaction_results_topic, &large.id, approval(&large.id)?).await?;

        expected += small.amount.value() + large.amount.value();
    }

    for _ in 0..200 {
        if engine.ledger().find_by_id(&account.id)?.balance == expected {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    timeout(Duration::from_secs(1), gateway.stop()).await??;

    assert_eq!(engine.ledger().find_by_id(&account.id)?.balance, expected);
    assert!(engine.list_invoices(&account.id)?.iter().all(|invoice| invoice.status == InvoiceStatus::Approved));

    Ok(())
}

#[tokio::test]
async fn test_batch_runner_replays_a_script() -> Result<()> {
    let mut file = NamedTempFile::new()?;

    writeln!(file, "type,account,invoice,amount,status")?;
    writeln!(file, "open,alice,,,")?;
    writeln!(file, "open,bob,,,")?;
    writeln!(file, "submit,alice,a1,500,")?;
    writeln!(file, "submit,alice,a2,15000,")?;
    writeln!(file, "submit,bob,b1,20000,")?;
    writeln!(file, "submit,bob,b2,-3,")?;
    writeln!(file, "review,,a2,,approved")?;
    writeln!(file, "review,,a2,,approved")?;
    writeln!(file, "review,,b1,,unsure")?;

    let path = file.path().to_str().ok_or_else(|| anyhow!("Temporary path is not UTF-8"))?;
    let summaries = BatchRunner::new(GatewayConfig::default()).run(path).await?;

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].name, "alice");
    assert_eq!(summaries[0].balance, dec!(15500));
    assert_eq!(summaries[0].pending, 0);
    assert_eq!(summaries[1].name, "bob");
    assert!(summaries[1].balance.is_zero());
    assert_eq!(summaries[1].pending, 1);

    Ok(())
}

#[tokio::test]
async fn test_batch_runner_applies_adjustments_republishes_and_queries() -> Result<()> {
    let mut file = NamedTempFile::new()?;

    writeln!(file, "type,account,invoice,amount,status")?;
    writeln!(file, "open,alice,,,")?;
    writeln!(file, "open,bob,,,")?;
    writeln!(file, "adjust,alice,,100.25,")?;
    writeln!(file, "adjust,alice,,-0.25,")?;
    writeln!(file, "adjust,ghost,,50,")?;
    writeln!(file, "submit,bob,b1,12000,")?;
    writeln!(file, "republish,,b1,,")?;
    writeln!(file, "query,bob,b1,,")?;
    writeln!(file, "query,alice,b1,,")?;
    writeln!(file, "review,,b1,,approved")?;
    writeln!(file, "review,,b1,,approved")?;

    let path = file.path().to_str().ok_or_else(|| anyhow!("Temporary path is not UTF-8"))?;
    let summaries = BatchRunner::new(GatewayConfig::default()).run(path).await?;

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].balance, dec!(100));
    assert_eq!(summaries[1].balance, dec!(12000));
    assert_eq!(summaries[1].pending, 0);

    Ok(())
}

#[tokio::test]
async fn test_batch_runner_handles_missing_file_without_error() -> Result<()> {
    let summaries = BatchRunner::new(GatewayConfig::default()).run("missing.csv").await?;

    assert!(summaries.is_empty());

    Ok(())
}
