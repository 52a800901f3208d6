use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{MessageConsumer, MessageProducer};
use crate::transport::{InboundMessage, Transport, TransportError};

/// `Transport` over a consumer on the inbound topic and a producer on the
/// outbound topic
pub struct KafkaTransport {
    consumer: MessageConsumer,
    producer: MessageProducer,
}

impl KafkaTransport {
    pub fn new(consumer: MessageConsumer, producer: MessageProducer) -> Self {
        Self { consumer, producer }
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    async fn next(&self, cancel: &CancellationToken) -> Result<InboundMessage, TransportError> {
        self.consumer.recv(cancel).await
    }

    async fn commit(
        &self,
        cancel: &CancellationToken,
        message: &InboundMessage,
    ) -> Result<(), TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        self.consumer.commit(message)
    }

    async fn publish(
        &self,
        cancel: &CancellationToken,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Result<(), TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.producer.send(key, value) => result.map(|_| ()),
        }
    }

    async fn rewind(&self, message: &InboundMessage) -> Result<(), TransportError> {
        self.consumer.seek(message)
    }
}
