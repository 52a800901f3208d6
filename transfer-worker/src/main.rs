// ============================================================================
// Transfer Worker
// ============================================================================
//
// Consumes "spool transfer ready" events from Kafka, moves the spool in the
// Spoolman inventory and publishes a "spool transfer complete" event.
//
// Flow:
// 1. Kafka consumer reads an event from KAFKA_CONSUMER_TOPIC
// 2. Check the target location against Spoolman's location list
// 3. Read the spool's current location
// 4. PATCH the spool to the new location
// 5. Publish the complete event (same partition key) to KAFKA_PRODUCER_TOPIC
// 6. COMMIT the Kafka offset
//
// If step 5 fails the offset is NOT committed and the partition is rewound,
// so the event is processed again. The spool is already at its target then,
// so the redelivered complete event reports the new location as old_location.
//
// SIGTERM/SIGINT stop fetching. An event already past step 4 is still
// published and committed, the producer is flushed, and the process exits 0.
// If a partition cannot be rewound after a failed publish the worker stops
// and the process exits non-zero, so the restart redelivers the message.
//
// ============================================================================

mod health;

use anyhow::{Context, Result};
use spool_relay_config::Config;
use spool_relay_shared::kafka::{KafkaTransport, MessageConsumer, MessageProducer};
use spool_relay_shared::pipeline::{KafkaDeadLetterSink, TransferWorker};
use spool_relay_shared::SpoolmanClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PUBLISH_QUEUE_MARGIN: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Spool Transfer Worker Starting ===");
    info!("Kafka Brokers: {}", config.kafka.brokers);
    info!("Kafka Consumer Topic: {}", config.kafka.consumer_topic);
    info!("Kafka Producer Topic: {}", config.kafka.producer_topic);
    info!("Kafka Consumer Group: {}", config.kafka.consumer_group);
    info!("Spoolman API: {}", config.inventory.api_url);
    info!(
        "Locations endpoint: /{}",
        config.inventory.locations_source.path()
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let inventory =
        Arc::new(SpoolmanClient::new(&config.inventory).context("Failed to create Spoolman client")?);

    let consumer =
        MessageConsumer::new(&config.kafka).context("Failed to initialize Kafka consumer")?;
    let producer =
        MessageProducer::new(&config.kafka).context("Failed to initialize Kafka producer")?;

    // Delivery timeout plus the producer's local queue wait
    let publish_timeout = Duration::from_millis(config.kafka.producer_delivery_timeout_ms.into())
        + PUBLISH_QUEUE_MARGIN;

    let mut worker = TransferWorker::new(
        inventory,
        Arc::new(KafkaTransport::new(consumer, producer.clone())),
        config.worker.clone(),
    )
    .with_publish_timeout(publish_timeout);

    match config.kafka.dlq_topic.as_deref() {
        Some(topic) => {
            info!("Dead-letter topic: {}", topic);
            worker = worker.with_dead_letters(Arc::new(KafkaDeadLetterSink::new(&producer, topic)));
        }
        None => info!("Dead-letter topic not configured; poison messages are only logged"),
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.health_port))
        .await
        .with_context(|| format!("Failed to bind health port {}", config.health_port))?;
    let health_server = tokio::spawn(health::serve(listener, shutdown.clone()));

    let result = worker.run(shutdown.clone()).await;
    // A worker error stops the health server too
    shutdown.cancel();

    // Graceful shutdown: flush pending Kafka messages before exit
    info!("Shutdown requested, flushing Kafka producer...");
    let flush_timeout = Duration::from_secs(config.worker.shutdown_flush_timeout_secs);
    if let Err(e) = producer.flush(flush_timeout).await {
        error!(error = %e, "Failed to flush Kafka producer on shutdown");
    }

    match health_server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Health server stopped with an error"),
        Err(e) => warn!(error = %e, "Health server task failed"),
    }

    let stats = result?;
    info!(
        forwarded = stats.forwarded,
        aborted = stats.aborted,
        committed = stats.committed,
        "Transfer worker stopped gracefully"
    );
    Ok(())
}

/// Cancel `shutdown` on SIGTERM or Ctrl-C
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, initiating graceful shutdown...");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("SIGINT received, initiating graceful shutdown...");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler, listening for Ctrl-C only");
                tokio::signal::ctrl_c().await.ok();
                info!("SIGINT received, initiating graceful shutdown...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, initiating graceful shutdown...");
    }
    shutdown.cancel();
}
