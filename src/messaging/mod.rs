mod kafka;

use async_trait::async_trait;

pub use kafka::KafkaPublisher;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publisher circuit is open, broker assumed down")]
    CircuitOpen,

    #[error("broker rejected the event: {0}")]
    Broker(String),
}

/// Fire-and-confirm event publishing. `key` is the broker partition key.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, key: &str, payload: &str) -> Result<(), PublishError>;
}
