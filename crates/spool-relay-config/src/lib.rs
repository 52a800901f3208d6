// ============================================================================
// Spool Relay Config - Centralized configuration management
// ============================================================================
//
// Configuration for the spool transfer relay. Loaded once from environment
// variables (and an optional .env file) at startup, immutable afterwards.
//
// ============================================================================

mod constants;
mod inventory;
mod kafka;
mod worker;

pub use inventory::{InventoryConfig, LocationsSource};
pub use kafka::KafkaConfig;
pub use worker::WorkerConfig;

use anyhow::Result;
use constants::*;

/// Main configuration structure for the transfer relay
#[derive(Clone, Debug)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub inventory: InventoryConfig,
    pub worker: WorkerConfig,
    /// Port for the `/health` and `/metrics` endpoint
    pub health_port: u16,
    pub rust_log: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            kafka: KafkaConfig::from_env(),
            inventory: InventoryConfig::from_env()?,
            worker: WorkerConfig::from_env(),
            health_port: std::env::var("HEALTH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_HEALTH_PORT),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        self.kafka.validate()?;
        self.inventory.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "KAFKA_BROKERS",
        "KAFKA_CONSUMER_TOPIC",
        "KAFKA_PRODUCER_TOPIC",
        "KAFKA_CONSUMER_GROUP",
        "KAFKA_DLQ_TOPIC",
        "SPOOLMAN_API_URL",
        "INVENTORY_LOCATIONS_SOURCE",
        "INVENTORY_REQUEST_TIMEOUT_SECS",
        "WORKER_REDELIVERY_BACKOFF_MS",
        "HEALTH_PORT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_with_api_url() {
        clear_env();
        std::env::set_var("SPOOLMAN_API_URL", "http://spoolman:7912/api/v1/");

        let config = Config::from_env().unwrap();
        assert_eq!(config.kafka.brokers, "localhost:9092");
        assert_eq!(config.kafka.consumer_topic, "spool-transfer-ready");
        assert_eq!(config.kafka.producer_topic, "spool-transfer-complete");
        assert_eq!(config.kafka.consumer_group, "spoolman-inventory-service");
        assert!(config.kafka.dlq_topic.is_none());
        // Trailing slash is trimmed so paths can be appended safely
        assert_eq!(config.inventory.api_url, "http://spoolman:7912/api/v1");
        assert_eq!(config.inventory.locations_source, LocationsSource::Location);
        assert_eq!(config.inventory.request_timeout_secs, 10);
        assert_eq!(config.worker.redelivery_backoff_ms, 500);
        assert_eq!(config.health_port, 8081);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_url_fails() {
        clear_env();

        let result = Config::from_env();
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "SPOOLMAN_API_URL must be set"
        );
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("SPOOLMAN_API_URL", "https://inventory.local");
        std::env::set_var("KAFKA_BROKERS", "k1:9092,k2:9092");
        std::env::set_var("KAFKA_DLQ_TOPIC", "spool-transfer-ready-dlq");
        std::env::set_var("INVENTORY_LOCATIONS_SOURCE", "setting");
        std::env::set_var("HEALTH_PORT", "9100");

        let config = Config::from_env().unwrap();
        assert_eq!(config.kafka.brokers, "k1:9092,k2:9092");
        assert_eq!(
            config.kafka.dlq_topic.as_deref(),
            Some("spool-transfer-ready-dlq")
        );
        assert_eq!(config.inventory.locations_source, LocationsSource::Setting);
        assert_eq!(config.health_port, 9100);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_same_topics_rejected() {
        clear_env();
        std::env::set_var("SPOOLMAN_API_URL", "http://spoolman");
        std::env::set_var("KAFKA_CONSUMER_TOPIC", "spools");
        std::env::set_var("KAFKA_PRODUCER_TOPIC", "spools");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_locations_source_rejected() {
        clear_env();
        std::env::set_var("SPOOLMAN_API_URL", "http://spoolman");
        std::env::set_var("INVENTORY_LOCATIONS_SOURCE", "database");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_api_url_without_scheme_rejected() {
        clear_env();
        std::env::set_var("SPOOLMAN_API_URL", "spoolman:7912");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_locations_source_paths() {
        assert_eq!(LocationsSource::Location.path(), "location");
        assert_eq!(LocationsSource::Setting.path(), "setting/locations");
    }
}
