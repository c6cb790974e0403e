use crate::broker::{InMemoryBroker, MessagePublisher};
use crate::config::GatewayConfig;
use crate::engine::Gateway;
use crate::models::GatewayError;
use crate::review::TransactionResultEvent;
use crate::types::{ApiKey, InvoiceId};
use anyhow::anyhow;
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{spawn_blocking, JoinHandle};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CommandType {
    Open,
    Adjust,
    Submit,
    Republish,
    Review,
    Query
}

/// One row of the input file.
#[derive(Debug, Clone, Deserialize)]
struct Command {
    #[serde(rename = "type")]
    command_type: CommandType,
    account: Option<String>,
    invoice: Option<String>,
    amount: Option<Decimal>,
    status: Option<String>
}

/// Final state of one account, keyed by the name used in the input.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AccountSummary {
    pub name: String,
    pub balance: Decimal,
    pub pending: usize
}

/// Replays a CSV script of account openings, charges and anti-fraud verdicts against a
/// gateway running on an in-memory broker.
///
/// `review` rows play the part of the external anti-fraud service: they are published to
/// the results topic and reach the gateway only through its review consumer. `adjust`
/// applies a direct balance change, `republish` sends a pending invoice to review again
/// and `query` looks an invoice up on behalf of an account.
pub struct BatchRunner {
    config: GatewayConfig,
    backpressure: usize
}

#[derive(Default)]
struct Labels {
    accounts: HashMap<String, ApiKey>,
    invoices: HashMap<String, InvoiceId>
}

impl BatchRunner {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            backpressure: 256
        }
    }

    /// Runs the script at `path` to completion and reports every account.
    pub async fn run(&self, path: &str) -> anyhow::Result<Vec<AccountSummary>> {
        let broker = InMemoryBroker::new(&self.config.broker.address);
        let gateway = Gateway::start(
            &self.config,
            Arc::new(broker.publisher()),
            Box::new(broker.subscribe(&self.config.broker.transaction_results_topic, &self.config.broker.consumer_group))
        );

        let (sender, receiver) = mpsc::channel::<Command>(self.backpressure);
        let csv_handle = self.spawn_csv_reader(path.to_string(), sender);
        let labels = self.process_commands(&gateway, &broker, receiver).await;

        if let Err(error) = csv_handle.await {
            error!("Script reader crashed, stopping the gateway: {error}");
            broker.close();
            gateway.stop().await?;

            return Err(anyhow!("Reading script [{path}] failed: {error}"))
        }

        broker.close();

        let engine = gateway.engine.clone();
        let repaired = gateway.drain().await?;

        if repaired > 0 {
            warn!("Reconciliation credited [{repaired}] invoices");
        }

        let mut summaries = Vec::with_capacity(labels.accounts.len());

        for (name, api_key) in labels.accounts {
            let account = engine.ledger().find_by_api_key(&api_key).await?;
            let pending = engine.list_invoices(&account.id)?.iter()
                .filter(|invoice| invoice.is_pending())
                .count();

            summaries.push(AccountSummary { name, balance: account.balance, pending });
        }

        summaries.sort_by(|left, right| left.name.cmp(&right.name));

        Ok(summaries)
    }

    /// Parses the script on a blocking thread and feeds its rows to `sender`. Rows that do
    /// not parse are reported with their line number and skipped.
    fn spawn_csv_reader(&self, path: String, sender: mpsc::Sender<Command>) -> JoinHandle<()> {
        spawn_blocking(move || {
            let script = match File::open(&path) {
                Ok(file) => BufReader::new(file),
                Err(error) => {
                    error!("Cannot open script [{path}]: {error}");
                    return;
                }
            };

            let mut rows = ReaderBuilder::new()
                .trim(Trim::All)
                .flexible(true)
                .from_reader(script);

            for row in rows.deserialize::<Command>() {
                let command = match row {
                    Ok(command) => command,
                    Err(error) => {
                        let line = error.position().map(|position| position.line()).unwrap_or_default();
                        warn!("Script line [{line}] skipped: {error}");
                        continue;
                    }
                };

                // The gateway side hung up, nothing left to feed.
                if sender.blocking_send(command).is_err() {
                    break;
                }
            }
        })
    }

    async fn process_commands(&self, gateway: &Gateway, broker: &InMemoryBroker, mut receiver: mpsc::Receiver<Command>) -> Labels {
        let mut labels = Labels::default();
        let reviewer = broker.publisher();

        while let Some(command) = receiver.recv().await {
            match command.command_type {
                CommandType::Open => self.open(gateway, &mut labels, &command),
                CommandType::Adjust => self.adjust(gateway, &labels, &command).await,
                CommandType::Submit => self.submit(gateway, &mut labels, &command).await,
                CommandType::Republish => self.republish(gateway, &labels, &command).await,
                CommandType::Review => self.review(&reviewer, &labels, &command).await,
                CommandType::Query => self.query(gateway, &labels, &command).await
            }
        }

        labels
    }

    fn open(&self, gateway: &Gateway, labels: &mut Labels, command: &Command) {
        let Some(name) = command.account.as_deref() else {
            warn!("Open row without an account name skipped");
            return;
        };

        if labels.accounts.contains_key(name) {
            warn!("Account [{name}] is already open");
            return;
        }

        match gateway.engine.ledger().create_account(name, &format!("{name}@merchants.local")) {
            Ok(account) => {
                labels.accounts.insert(name.to_string(), account.api_key);
            }
            Err(error) => warn!("Could not open account [{name}]: {error}")
        }
    }

    async fn adjust(&self, gateway: &Gateway, labels: &Labels, command: &Command) {
        let (Some(name), Some(amount)) = (command.account.as_deref(), command.amount) else {
            warn!("Adjust row needs an account and an amount: {command:?}");
            return;
        };

        let Some(api_key) = labels.accounts.get(name) else {
            warn!("Adjust for unknown account [{name}] skipped");
            return;
        };

        let ledger = gateway.engine.ledger();
        let adjusted = match ledger.find_by_api_key(api_key).await {
            Ok(account) => ledger.add_balance(&account.id, amount),
            Err(error) => Err(error)
        };

        if let Err(error) = adjusted {
            warn!("Balance adjustment of [{amount}] for [{name}] failed: {error}");
        }
    }

    async fn submit(&self, gateway: &Gateway, labels: &mut Labels, command: &Command) {
        let (Some(name), Some(label), Some(amount)) = (command.account.as_deref(), command.invoice.as_deref(), command.amount) else {
            warn!("Submit row needs an account, an invoice and an amount: {command:?}");
            return;
        };

        if labels.invoices.contains_key(label) {
            warn!("Invoice label [{label}] was already used");
            return;
        }

        let Some(api_key) = labels.accounts.get(name) else {
            warn!("Submit for unknown account [{name}] skipped");
            return;
        };

        let account = match gateway.engine.ledger().find_by_api_key(api_key).await {
            Ok(account) => account,
            Err(error) => {
                warn!("Submit for [{name}] rejected: {error}");
                return;
            }
        };

        match gateway.engine.submit(&account.id, amount).await {
            Ok(invoice) => {
                labels.invoices.insert(label.to_string(), invoice.id);
            }
            Err(GatewayError::PublishFailed { invoice_id, reason }) => {
                warn!("Invoice [{label}] for [{name}] is pending but was not sent for review: {reason}");
                labels.invoices.insert(label.to_string(), invoice_id);
            }
            Err(error) => warn!("Invoice [{label}] for [{name}] failed: {error}")
        }
    }

    async fn republish(&self, gateway: &Gateway, labels: &Labels, command: &Command) {
        let Some(label) = command.invoice.as_deref() else {
            warn!("Republish row needs an invoice: {command:?}");
            return;
        };

        let Some(invoice_id) = labels.invoices.get(label) else {
            warn!("Republish for unknown invoice [{label}] skipped");
            return;
        };

        if let Err(error) = gateway.engine.republish(invoice_id).await {
            warn!("Invoice [{label}] was not sent for review again: {error}");
        }
    }

    async fn query(&self, gateway: &Gateway, labels: &Labels, command: &Command) {
        let (Some(name), Some(label)) = (command.account.as_deref(), command.invoice.as_deref()) else {
            warn!("Query row needs an account and an invoice: {command:?}");
            return;
        };

        let (Some(api_key), Some(invoice_id)) = (labels.accounts.get(name), labels.invoices.get(label)) else {
            warn!("Query of [{label}] by [{name}] names an unknown account or invoice");
            return;
        };

        match gateway.engine.find_invoice_for_api_key(api_key, invoice_id).await {
            Ok(invoice) => info!("Invoice [{label}] of [{}] for [{name}] is [{}]", invoice.amount, invoice.status),
            Err(error) => warn!("Query of [{label}] by [{name}] refused: {error}")
        }
    }

    async fn review(&self, reviewer: &dyn MessagePublisher, labels: &Labels, command: &Command) {
        let (Some(label), Some(status)) = (command.invoice.as_deref(), command.status.as_deref()) else {
            warn!("Review row needs an invoice and a status: {command:?}");
            return;
        };

        let Some(invoice_id) = labels.invoices.get(label) else {
            warn!("Review for unknown invoice [{label}] skipped");
            return;
        };

        // Forwarded verbatim, the consumer validates it.
        let event = TransactionResultEvent::new(invoice_id, status);

        let published = match event.to_bytes() {
            Ok(payload) => reviewer.publish(&self.config.broker.transaction_results_topic, invoice_id, payload).await,
            Err(error) => Err(error)
        };

        if let Err(error) = published {
            warn!("Review [{status}] for invoice [{label}] could not be published: {error}");
        }
    }
}
