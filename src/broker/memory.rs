use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::debug;

use crate::broker::{Message, MessagePublisher, MessageSubscriber};
use crate::models::GatewayError;

#[derive(Default)]
struct BrokerState {
    /// Retained records per topic.
    topics: DashMap<String, Vec<Message>>,
    /// Next offset to hand out per (topic, consumer group).
    offsets: DashMap<(String, String), usize>,
    closed: AtomicBool,
    appended: Notify
}

/// In-process broker with the delivery semantics of a single-partition log.
///
/// Topics retain every record. Each consumer group has one committed offset per topic,
/// shared by all of its subscribers, so a record is delivered once per group. Records
/// published before a group subscribes are still delivered to it. After [`close`] no
/// publish is accepted and subscribers end once they have drained their backlog.
///
/// [`close`]: InMemoryBroker::close
#[derive(Clone)]
pub struct InMemoryBroker {
    address: String,
    state: Arc<BrokerState>
}

impl InMemoryBroker {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            state: Arc::new(BrokerState::default())
        }
    }

    pub fn publisher(&self) -> InMemoryPublisher {
        InMemoryPublisher {
            broker: self.clone(),
            closed: AtomicBool::new(false)
        }
    }

    pub fn subscribe(&self, topic: &str, group: &str) -> InMemorySubscriber {
        debug!("Consumer group [{group}] subscribed to [{topic}] on [{}]", self.address);

        InMemorySubscriber {
            broker: self.clone(),
            topic: topic.to_string(),
            group: group.to_string(),
            closed: false
        }
    }

    /// Every record ever published to `topic`, in publish order.
    #[cfg(test)]
    pub fn messages(&self, topic: &str) -> Vec<Message> {
        self.state.topics.get(topic)
            .map(|log| log.value().clone())
            .unwrap_or_default()
    }

    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.appended.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    fn append(&self, message: Message) -> Result<(), GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::Transport(format!("Broker [{}] is closed", self.address)))
        }

        self.state.topics.entry(message.topic.clone()).or_default().push(message);
        self.state.appended.notify_waiters();

        Ok(())
    }

    fn claim(&self, topic: &str, group: &str) -> Option<Message> {
        let mut offset = self.state.offsets
            .entry((topic.to_string(), group.to_string()))
            .or_insert(0);
        let log = self.state.topics.get(topic)?;
        let message = log.get(*offset)?.clone();

        *offset += 1;

        Some(message)
    }
}

pub struct InMemoryPublisher {
    broker: InMemoryBroker,
    closed: AtomicBool
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), GatewayError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("Publisher is closed".to_string()))
        }

        self.broker.append(Message {
            topic: topic.to_string(),
            key: key.to_string(),
            payload
        })
    }

    async fn close(&self) -> Result<(), GatewayError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct InMemorySubscriber {
    broker: InMemoryBroker,
    topic: String,
    group: String,
    closed: bool
}

#[async_trait]
impl MessageSubscriber for InMemorySubscriber {
    async fn next_message(&mut self) -> Result<Option<Message>, GatewayError> {
        loop {
            if self.closed {
                return Ok(None)
            }

            // Register for wake-ups before looking at the log so an append that lands in
            // between is not missed.
            let appended = self.broker.state.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            if let Some(message) = self.broker.claim(&self.topic, &self.group) {
                return Ok(Some(message))
            }

            if self.broker.is_closed() {
                return Ok(None)
            }

            appended.await;
        }
    }

    async fn close(&mut self) -> Result<(), GatewayError> {
        if !self.closed {
            self.closed = true;
            debug!("Consumer group [{}] left [{}]", self.group, self.topic);
        }

        Ok(())
    }
}
