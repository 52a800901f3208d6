// ============================================================================
// Transfer Worker Configuration
// ============================================================================

use crate::constants::*;

/// Timings for the transfer worker loop
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Pause after a broker fetch error before polling again (milliseconds)
    pub fetch_error_backoff_ms: u64,
    /// Pause after a publish failure before the rewound message is retried (milliseconds)
    pub redelivery_backoff_ms: u64,
    /// How often the worker logs its counters (seconds)
    pub metrics_log_interval_secs: u64,
    /// Upper bound for flushing the producer on shutdown (seconds)
    pub shutdown_flush_timeout_secs: u64,
}

impl WorkerConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            fetch_error_backoff_ms: std::env::var("WORKER_FETCH_ERROR_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FETCH_ERROR_BACKOFF_MS),
            redelivery_backoff_ms: std::env::var("WORKER_REDELIVERY_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REDELIVERY_BACKOFF_MS),
            metrics_log_interval_secs: std::env::var("WORKER_METRICS_LOG_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_METRICS_LOG_INTERVAL_SECS),
            shutdown_flush_timeout_secs: std::env::var("WORKER_SHUTDOWN_FLUSH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SHUTDOWN_FLUSH_TIMEOUT_SECS),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            fetch_error_backoff_ms: DEFAULT_FETCH_ERROR_BACKOFF_MS,
            redelivery_backoff_ms: DEFAULT_REDELIVERY_BACKOFF_MS,
            metrics_log_interval_secs: DEFAULT_METRICS_LOG_INTERVAL_SECS,
            shutdown_flush_timeout_secs: DEFAULT_SHUTDOWN_FLUSH_TIMEOUT_SECS,
        }
    }
}
