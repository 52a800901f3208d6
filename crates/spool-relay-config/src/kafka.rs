// ============================================================================
// Kafka Configuration
// ============================================================================

use crate::constants::*;

/// Kafka configuration for the transfer relay
///
/// The relay reads ready events from `consumer_topic` and writes complete
/// events to `producer_topic`, both on the same cluster.
#[derive(Clone, Debug)]
pub struct KafkaConfig {
    /// Comma-separated list of Kafka brokers (e.g., "kafka1:9092,kafka2:9092")
    pub brokers: String,
    /// Topic carrying spool transfer ready events
    pub consumer_topic: String,
    /// Topic receiving spool transfer complete events
    pub producer_topic: String,
    /// Consumer group ID; offsets are stored against this group
    pub consumer_group: String,
    /// Optional dead-letter topic for poison messages (malformed / invalid)
    pub dlq_topic: Option<String>,
    /// SSL/TLS enabled
    pub ssl_enabled: bool,
    /// SASL mechanism (e.g., "SCRAM-SHA-256", "PLAIN")
    pub sasl_mechanism: Option<String>,
    /// SASL username
    pub sasl_username: Option<String>,
    /// SASL password
    pub sasl_password: Option<String>,
    /// Path to CA certificate file (for self-signed certificates)
    pub ssl_ca_location: Option<String>,
    // producer-specific settings
    pub producer_compression: String, // "zstd" | "snappy" | "gzip" | "lz4" | "none"
    pub producer_acks: String,        // "all" | "1" | "-1" | "0"
    pub producer_linger_ms: u32,
    pub producer_delivery_timeout_ms: u32,
    pub producer_enable_idempotence: bool,
}

impl KafkaConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            brokers: std::env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| DEFAULT_KAFKA_BROKERS.to_string()),
            consumer_topic: std::env::var("KAFKA_CONSUMER_TOPIC")
                .unwrap_or_else(|_| DEFAULT_CONSUMER_TOPIC.to_string()),
            producer_topic: std::env::var("KAFKA_PRODUCER_TOPIC")
                .unwrap_or_else(|_| DEFAULT_PRODUCER_TOPIC.to_string()),
            consumer_group: std::env::var("KAFKA_CONSUMER_GROUP")
                .unwrap_or_else(|_| DEFAULT_CONSUMER_GROUP.to_string()),
            dlq_topic: std::env::var("KAFKA_DLQ_TOPIC")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            ssl_enabled: std::env::var("KAFKA_SSL_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            sasl_mechanism: std::env::var("KAFKA_SASL_MECHANISM").ok(),
            sasl_username: std::env::var("KAFKA_SASL_USERNAME").ok(),
            sasl_password: std::env::var("KAFKA_SASL_PASSWORD").ok(),
            ssl_ca_location: std::env::var("KAFKA_SSL_CA_LOCATION").ok(),
            producer_compression: std::env::var("KAFKA_PRODUCER_COMPRESSION")
                .unwrap_or_else(|_| "snappy".to_string()),
            producer_acks: std::env::var("KAFKA_PRODUCER_ACKS")
                .unwrap_or_else(|_| "all".to_string()),
            producer_linger_ms: std::env::var("KAFKA_PRODUCER_LINGER_MS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            producer_delivery_timeout_ms: std::env::var("KAFKA_PRODUCER_DELIVERY_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30000),
            producer_enable_idempotence: std::env::var("KAFKA_PRODUCER_ENABLE_IDEMPOTENCE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Broker list and topic sanity checks
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if self.brokers.trim().is_empty() {
            anyhow::bail!("KAFKA_BROKERS must not be empty");
        }
        if self.consumer_topic.trim().is_empty() || self.producer_topic.trim().is_empty() {
            anyhow::bail!("KAFKA_CONSUMER_TOPIC and KAFKA_PRODUCER_TOPIC must not be empty");
        }
        if self.consumer_topic == self.producer_topic {
            anyhow::bail!(
                "KAFKA_CONSUMER_TOPIC and KAFKA_PRODUCER_TOPIC must differ (both are '{}')",
                self.consumer_topic
            );
        }
        if let Some(dlq) = &self.dlq_topic {
            if dlq == &self.consumer_topic {
                anyhow::bail!("KAFKA_DLQ_TOPIC must not be the consumer topic");
            }
        }
        if self.sasl_mechanism.is_some()
            && (self.sasl_username.is_none() || self.sasl_password.is_none())
        {
            tracing::warn!(
                "KAFKA_SASL_MECHANISM is set without KAFKA_SASL_USERNAME/KAFKA_SASL_PASSWORD; SASL will not be configured"
            );
        }
        Ok(())
    }
}
