use anyhow::{Context, Result};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use spool_relay_config::KafkaConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::config::create_client_config;
use crate::metrics;
use crate::transport::TransportError;

/// How long a record may wait for space in the local producer queue
const QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka producer bound to one topic
///
/// This producer is configured for:
/// - At-least-once delivery guarantees (`acks=all`)
/// - Idempotent writes (no duplicates within producer session)
/// - Low latency (small linger window)
///
/// `for_topic` returns a handle to another topic sharing the same connection.
pub struct MessageProducer {
    producer: Arc<FutureProducer>,
    topic: String,
}

impl MessageProducer {
    /// Create a new Kafka producer for `config.producer_topic`.
    ///
    /// # Configuration
    /// - `acks`, `compression.type`, `linger.ms`, `delivery.timeout.ms` from config
    /// - `enable.idempotence`: prevent duplicate writes on internal retries
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        info!("Initializing Kafka producer...");
        let mut client_config = create_client_config(config)?;

        let producer: FutureProducer = client_config
            // Reliability settings
            .set("acks", &config.producer_acks)
            .set(
                "enable.idempotence",
                if config.producer_enable_idempotence {
                    "true"
                } else {
                    "false"
                },
            )
            .set("compression.type", &config.producer_compression)
            .set("linger.ms", config.producer_linger_ms.to_string())
            .set(
                "delivery.timeout.ms",
                config.producer_delivery_timeout_ms.to_string(),
            )
            .create()
            .context("Failed to create Kafka producer")?;

        info!(
            "Kafka producer initialized successfully for topic '{}'",
            config.producer_topic
        );

        Ok(Self {
            producer: Arc::new(producer),
            topic: config.producer_topic.clone(),
        })
    }

    /// A producer for `topic` sharing this producer's connection
    pub fn for_topic(&self, topic: impl Into<String>) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            topic: topic.into(),
        }
    }

    /// Send a record and wait for the broker acknowledgment
    ///
    /// # Returns
    /// * `Ok((partition, offset))` - Successfully written to Kafka
    /// * `Err(TransportError::Kafka)` - Delivery failed or timed out
    pub async fn send(
        &self,
        key: Option<&[u8]>,
        payload: &[u8],
    ) -> Result<(i32, i64), TransportError> {
        let mut record: FutureRecord<'_, [u8], [u8]> =
            FutureRecord::to(&self.topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        let start = Instant::now();

        match self.producer.send(record, Timeout::After(QUEUE_TIMEOUT)).await {
            Ok((partition, offset)) => {
                let latency = start.elapsed();
                metrics::PUBLISH_LATENCY.observe(latency.as_secs_f64());

                debug!(
                    topic = %self.topic,
                    partition = partition,
                    offset = offset,
                    latency_ms = latency.as_millis(),
                    "Message published to Kafka"
                );

                Ok((partition, offset))
            }
            Err((kafka_err, _)) => {
                metrics::PUBLISH_FAILURES.inc();

                error!(
                    error = %kafka_err,
                    topic = %self.topic,
                    latency_ms = start.elapsed().as_millis(),
                    "Failed to send message to Kafka"
                );

                Err(TransportError::Kafka(format!("Kafka send failed: {}", kafka_err)))
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Flush pending messages (for graceful shutdown)
    ///
    /// This waits for all in-flight messages to be acknowledged.
    pub async fn flush(&self, timeout: Duration) -> Result<()> {
        info!("Flushing Kafka producer (timeout: {:?})", timeout);

        self.producer
            .flush(Timeout::After(timeout))
            .context("Failed to flush Kafka producer")?;

        info!("Kafka producer flushed successfully");
        Ok(())
    }
}

impl Clone for MessageProducer {
    fn clone(&self) -> Self {
        self.for_topic(self.topic.clone())
    }
}
