//! Prometheus metrics for the transfer relay
//!
//! Registered lazily in the default registry:
//! - Kafka consumption / publication
//! - Pipeline outcomes (forwarded, aborted by reason, redelivered)
//! - Inventory API latency

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    opts, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec,
    TextEncoder,
};

// ============================================================================
// Kafka Metrics
// ============================================================================

/// Messages fetched from the inbound topic
pub static MESSAGES_CONSUMED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "spool_relay_messages_consumed_total",
        "Total number of messages fetched from the inbound topic"
    ))
    .expect("Failed to register MESSAGES_CONSUMED metric")
});

pub static CONSUME_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "spool_relay_consume_failures_total",
        "Total number of Kafka fetch errors"
    ))
    .expect("Failed to register CONSUME_FAILURES metric")
});

pub static PUBLISH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "spool_relay_publish_failures_total",
        "Total number of failed Kafka produce operations"
    ))
    .expect("Failed to register PUBLISH_FAILURES metric")
});

pub static PUBLISH_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "spool_relay_publish_latency_seconds",
        "Kafka produce latency in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register PUBLISH_LATENCY metric")
});

pub static MESSAGES_COMMITTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "spool_relay_messages_committed_total",
        "Total number of inbound offsets committed"
    ))
    .expect("Failed to register MESSAGES_COMMITTED metric")
});

pub static COMMIT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "spool_relay_commit_failures_total",
        "Total number of failed offset commits"
    ))
    .expect("Failed to register COMMIT_FAILURES metric")
});

// ============================================================================
// Pipeline Metrics
// ============================================================================

pub static TRANSFERS_FORWARDED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "spool_relay_transfers_forwarded_total",
        "Total number of transfer complete events published"
    ))
    .expect("Failed to register TRANSFERS_FORWARDED metric")
});

/// Aborted messages by reason (transient, malformed, invalid, publish_failure, cancelled)
pub static MESSAGES_ABORTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "spool_relay_messages_aborted_total",
            "Total number of messages whose processing was aborted"
        ),
        &["reason"]
    )
    .expect("Failed to register MESSAGES_ABORTED metric")
});

/// Messages left uncommitted and rewound for redelivery
pub static MESSAGES_REDELIVERED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "spool_relay_messages_redelivered_total",
        "Total number of messages rewound for redelivery"
    ))
    .expect("Failed to register MESSAGES_REDELIVERED metric")
});

pub static DEAD_LETTERED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "spool_relay_dead_lettered_total",
        "Total number of poison messages copied to the dead-letter topic"
    ))
    .expect("Failed to register DEAD_LETTERED metric")
});

// ============================================================================
// Inventory API Metrics
// ============================================================================

pub static INVENTORY_REQUEST_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "spool_relay_inventory_request_seconds",
        "Inventory API request duration in seconds",
        &["operation"]
    )
    .expect("Failed to register INVENTORY_REQUEST_SECONDS metric")
});

/// Render all registered metrics in the Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
