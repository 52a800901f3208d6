// ============================================================================
// Transport Adapter
// ============================================================================
//
// Broker capability used by the pipeline: fetch the next inbound message,
// commit it, publish an outbound message. `KafkaTransport` is the production
// implementation; `testing::MemoryTransport` backs the pipeline tests.
//
// ============================================================================

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A message read from the inbound topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Partition key, forwarded unchanged to the outbound topic
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn key_lossy(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport operation cancelled")]
    Cancelled,

    #[error("Kafka error: {0}")]
    Kafka(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Block until a message is available or `cancel` fires
    async fn next(&self, cancel: &CancellationToken) -> Result<InboundMessage, TransportError>;

    /// Mark `message` (and everything before it in its partition) as processed
    async fn commit(
        &self,
        cancel: &CancellationToken,
        message: &InboundMessage,
    ) -> Result<(), TransportError>;

    /// Publish to the outbound topic
    async fn publish(
        &self,
        cancel: &CancellationToken,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Reposition the message's partition so `message` is fetched again.
    ///
    /// Without this a later commit in the same partition would silently
    /// cover an uncommitted message.
    async fn rewind(&self, message: &InboundMessage) -> Result<(), TransportError>;
}
