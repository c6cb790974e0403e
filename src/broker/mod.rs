mod memory;

use async_trait::async_trait;

use crate::models::GatewayError;

pub use memory::InMemoryBroker;

/// A record on a topic. `key` carries the invoice id so that all records about one
/// invoice land on the same partition of a partitioned broker.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Message {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>
}

/// Write side of the broker.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), GatewayError>;

    /// Flushes outstanding records and releases the connection. Calling it again is a no-op.
    async fn close(&self) -> Result<(), GatewayError>;
}

/// Read side of the broker, bound to one topic and consumer group.
#[async_trait]
pub trait MessageSubscriber: Send {
    /// Waits for the next record. `Ok(None)` means the subscription has ended and no
    /// further records will arrive.
    async fn next_message(&mut self) -> Result<Option<Message>, GatewayError>;

    /// Leaves the consumer group. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), GatewayError>;
}
