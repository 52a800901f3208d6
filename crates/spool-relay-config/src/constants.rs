// ============================================================================
// Configuration Constants
// ============================================================================

// Kafka defaults
pub(crate) const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";
pub(crate) const DEFAULT_CONSUMER_TOPIC: &str = "spool-transfer-ready";
pub(crate) const DEFAULT_PRODUCER_TOPIC: &str = "spool-transfer-complete";
pub(crate) const DEFAULT_CONSUMER_GROUP: &str = "spoolman-inventory-service";

// Inventory API
pub(crate) const DEFAULT_INVENTORY_REQUEST_TIMEOUT_SECS: u64 = 10;

// Worker loop timings
pub(crate) const DEFAULT_FETCH_ERROR_BACKOFF_MS: u64 = 1000;
// Pause after a publish failure before the rewound message is fetched again
pub(crate) const DEFAULT_REDELIVERY_BACKOFF_MS: u64 = 500;
pub(crate) const DEFAULT_METRICS_LOG_INTERVAL_SECS: u64 = 30;
pub(crate) const DEFAULT_SHUTDOWN_FLUSH_TIMEOUT_SECS: u64 = 10;

// Health / metrics endpoint
pub(crate) const DEFAULT_HEALTH_PORT: u16 = 8081;
