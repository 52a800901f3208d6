// ============================================================================
// Dead Letter Topic
// ============================================================================
//
// Malformed and invalid messages can never succeed, so the worker commits
// them and moves on. When KAFKA_DLQ_TOPIC is set, a copy goes to that topic
// first so it can be inspected or replayed by hand.
//
// Transient failures are not dead-lettered; they are committed like any
// other abort and the upstream producer is expected to resend.
//
// ============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::outcome::{AbortReason, Stage};
use crate::kafka::MessageProducer;
use crate::transport::InboundMessage;

/// A poison message with the reason it was abandoned
///
/// Key and payload are kept byte-exact (base64) so the record can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterMessage {
    pub source_topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Original partition key (base64)
    pub key: Option<String>,
    /// Original payload (base64)
    pub payload: String,
    /// The payload as text, when it is valid UTF-8
    pub payload_text: Option<String>,
    /// Last state the message reached
    pub stage: String,
    /// Abort reason label (`malformed` or `invalid`)
    pub reason: String,
    pub failure_reason: String,
    /// Unix timestamp when the message was dead-lettered
    pub dead_lettered_at: i64,
}

impl DeadLetterMessage {
    pub fn new(message: &InboundMessage, stage: Stage, reason: &AbortReason) -> Self {
        Self {
            source_topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            key: message.key.as_deref().map(|k| BASE64.encode(k)),
            payload: BASE64.encode(&message.payload),
            payload_text: std::str::from_utf8(&message.payload)
                .ok()
                .map(str::to_string),
            stage: stage.as_str().to_string(),
            reason: reason.label().to_string(),
            failure_reason: reason.to_string(),
            dead_lettered_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Original key bytes
    pub fn key_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.key
            .as_deref()
            .map(|k| BASE64.decode(k).context("Invalid base64 dead-letter key"))
            .transpose()
    }

    /// Original payload bytes
    pub fn payload_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.payload)
            .context("Invalid base64 dead-letter payload")
    }
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Publish `letter` under the original partition `key`
    async fn send(&self, key: Option<&[u8]>, letter: &DeadLetterMessage) -> Result<()>;
}

/// Dead-letter sink writing JSON records to a Kafka topic
pub struct KafkaDeadLetterSink {
    producer: MessageProducer,
}

impl KafkaDeadLetterSink {
    /// Share `producer`'s connection, writing to `topic`
    pub fn new(producer: &MessageProducer, topic: &str) -> Self {
        Self {
            producer: producer.for_topic(topic),
        }
    }
}

#[async_trait]
impl DeadLetterSink for KafkaDeadLetterSink {
    async fn send(&self, key: Option<&[u8]>, letter: &DeadLetterMessage) -> Result<()> {
        let payload =
            serde_json::to_vec(letter).context("Failed to serialize dead-letter message")?;

        self.producer
            .send(key, &payload)
            .await
            .context("Failed to publish dead-letter message")?;

        warn!(
            dlq_topic = %self.producer.topic(),
            source_offset = letter.offset,
            reason = %letter.reason,
            "Message copied to dead-letter topic"
        );

        Ok(())
    }
}
