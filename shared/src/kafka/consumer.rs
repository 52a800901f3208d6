use anyhow::{Context, Result};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{Message, Offset, TopicPartitionList};
use spool_relay_config::KafkaConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::config::create_client_config;
use crate::metrics;
use crate::transport::{InboundMessage, TransportError};

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka consumer for spool transfer ready events
///
/// This consumer is configured for:
/// - Manual offset commits (the pipeline decides when a message is done)
/// - Consumer group coordination (multiple relay instances)
/// - Auto-rebalancing on instance addition/removal
pub struct MessageConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl MessageConsumer {
    /// Create a new Kafka consumer subscribed to `config.consumer_topic`.
    ///
    /// # Configuration
    /// - `enable.auto.commit=false`: Manual offset management.
    /// - `auto.offset.reset=earliest`: Read from beginning on first start.
    /// - `session.timeout.ms=30000`: 30s session timeout.
    /// - `heartbeat.interval.ms=3000`: 3s heartbeat interval.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        info!("Initializing Kafka consumer...");
        let mut client_config = create_client_config(config)?;

        let consumer: StreamConsumer = client_config
            .set("group.id", &config.consumer_group)
            // Offset management
            .set("enable.auto.commit", "false") // Manual commit after processing
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest") // Read from beginning
            // Performance
            .set("fetch.min.bytes", "1")
            .set("fetch.wait.max.ms", "500") // Max wait for fetch
            .set("max.partition.fetch.bytes", "1048576") // 1MB
            // Session management
            .set("session.timeout.ms", "30000") // 30s timeout
            .set("heartbeat.interval.ms", "3000") // 3s heartbeat
            .set("max.poll.interval.ms", "300000") // 5min max processing time
            .create()
            .context("Failed to create Kafka consumer")?;

        consumer
            .subscribe(&[&config.consumer_topic])
            .context("Failed to subscribe to Kafka topic")?;

        info!(
            "Kafka consumer initialized for topic '{}' in group '{}'",
            config.consumer_topic, config.consumer_group
        );

        Ok(Self {
            consumer,
            topic: config.consumer_topic.clone(),
        })
    }

    /// Wait for the next message, or until `cancel` fires
    pub async fn recv(&self, cancel: &CancellationToken) -> Result<InboundMessage, TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.consumer.recv() => match result {
                Ok(message) => {
                    metrics::MESSAGES_CONSUMED.inc();
                    Ok(InboundMessage {
                        topic: message.topic().to_string(),
                        partition: message.partition(),
                        offset: message.offset(),
                        key: message.key().map(|k| k.to_vec()),
                        // An empty payload fails decoding downstream like any other bad payload
                        payload: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
                    })
                }
                Err(e) => {
                    metrics::CONSUME_FAILURES.inc();
                    error!(error = %e, topic = %self.topic, "Kafka consumer error");
                    Err(TransportError::Kafka(e.to_string()))
                }
            },
        }
    }

    /// Commit the offset following `message` in its partition
    ///
    /// If the relay crashes before committing, the message is redelivered.
    pub fn commit(&self, message: &InboundMessage) -> Result<(), TransportError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .map_err(|e| TransportError::Kafka(e.to_string()))?;

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| TransportError::Kafka(format!("Failed to commit offset: {}", e)))
    }

    /// Move the partition's fetch position back to `message`
    pub fn seek(&self, message: &InboundMessage) -> Result<(), TransportError> {
        self.consumer
            .seek(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset),
                SEEK_TIMEOUT,
            )
            .map_err(|e| TransportError::Kafka(format!("Failed to seek: {}", e)))
    }
}
