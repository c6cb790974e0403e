mod consumer;
mod events;
mod producer;

pub use consumer::FraudReviewConsumer;
pub use events::{PendingTransactionEvent, TransactionResultEvent};
pub use producer::FraudReviewProducer;
