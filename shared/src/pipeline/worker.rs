// ============================================================================
// Transfer Worker
// ============================================================================
//
// Consume loop: fetch → process → settle, one message at a time.
//
// Settlement:
// - Forwarded                      → commit
// - Aborted(Transient)             → commit (upstream resends)
// - Aborted(Malformed | Invalid)   → dead-letter (if configured), commit
// - Aborted(PublishFailure)        → NO commit; rewind the partition so the
//                                    same message is fetched again
// - Aborted(Cancelled)             → NO commit; redelivered after restart
//
// A failed rewind stops the loop with an error. Committing any later offset
// in that partition would also cover the unpublished message.
//
// Commits run on a detached token so a message that finished processing is
// still committed while shutdown drains the loop.
//
// ============================================================================

use anyhow::{Context, Result};
use spool_relay_config::WorkerConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dead_letter::{DeadLetterMessage, DeadLetterSink};
use super::outcome::{AbortReason, Outcome, Stage};
use super::processor::TransferProcessor;
use crate::inventory::InventoryClient;
use crate::metrics;
use crate::transport::{InboundMessage, Transport, TransportError};

/// Counters accumulated over one `run`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub consumed: u64,
    pub forwarded: u64,
    pub aborted: u64,
    pub committed: u64,
    pub commit_failures: u64,
    pub redelivered: u64,
    pub dead_lettered: u64,
}

impl WorkerStats {
    fn since(&self, earlier: &WorkerStats) -> WorkerStats {
        WorkerStats {
            consumed: self.consumed - earlier.consumed,
            forwarded: self.forwarded - earlier.forwarded,
            aborted: self.aborted - earlier.aborted,
            committed: self.committed - earlier.committed,
            commit_failures: self.commit_failures - earlier.commit_failures,
            redelivered: self.redelivered - earlier.redelivered,
            dead_lettered: self.dead_lettered - earlier.dead_lettered,
        }
    }
}

pub struct TransferWorker {
    processor: TransferProcessor,
    transport: Arc<dyn Transport>,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    config: WorkerConfig,
}

impl TransferWorker {
    pub fn new(
        inventory: Arc<dyn InventoryClient>,
        transport: Arc<dyn Transport>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            processor: TransferProcessor::new(inventory, Arc::clone(&transport)),
            transport,
            dead_letters: None,
            config,
        }
    }

    /// Copy malformed and invalid messages to `sink` before committing them
    pub fn with_dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    /// Upper bound for publishing a complete event
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.processor = self.processor.with_publish_timeout(timeout);
        self
    }

    /// Run until `shutdown` fires
    ///
    /// The message in flight when `shutdown` fires is settled before return:
    /// committed if it got past the inventory update, left for redelivery
    /// otherwise.
    ///
    /// Returns an error when an unpublished message cannot be rewound; the
    /// process must restart so the broker redelivers it.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();
        let mut logged = WorkerStats::default();
        let mut last_metrics_log = Instant::now();
        let metrics_interval = Duration::from_secs(self.config.metrics_log_interval_secs);

        info!("Transfer worker started");

        while !shutdown.is_cancelled() {
            let message = match self.transport.next(&shutdown).await {
                Ok(message) => message,
                Err(TransportError::Cancelled) => break,
                Err(e) => {
                    error!(error = %e, "Kafka consumer error");
                    self.pause(&shutdown, self.config.fetch_error_backoff_ms).await;
                    continue;
                }
            };
            stats.consumed += 1;

            let outcome = self.processor.process(&message, &shutdown).await;
            self.settle(&message, outcome, &shutdown, &mut stats)
                .await
                .with_context(|| {
                    format!(
                        "Stopping with partition {} offset {} unpublished",
                        message.partition, message.offset
                    )
                })?;

            // Log metrics periodically
            if last_metrics_log.elapsed() >= metrics_interval {
                let window = stats.since(&logged);
                info!(
                    consumed = window.consumed,
                    forwarded = window.forwarded,
                    aborted = window.aborted,
                    redelivered = window.redelivered,
                    dead_lettered = window.dead_lettered,
                    commit_failures = window.commit_failures,
                    "Transfer worker metrics (last {}s)",
                    metrics_interval.as_secs()
                );
                logged = stats;
                last_metrics_log = Instant::now();
            }
        }

        info!(
            consumed = stats.consumed,
            forwarded = stats.forwarded,
            aborted = stats.aborted,
            "Transfer worker stopped"
        );

        Ok(stats)
    }

    async fn settle(
        &self,
        message: &InboundMessage,
        outcome: Outcome,
        shutdown: &CancellationToken,
        stats: &mut WorkerStats,
    ) -> Result<(), TransportError> {
        match outcome {
            Outcome::Forwarded(event) => {
                stats.forwarded += 1;
                metrics::TRANSFERS_FORWARDED.inc();

                info!(
                    spool_id = %event.ready_event.spool_id,
                    location_id = %event.ready_event.location_id,
                    old_location = %event.old_location.id,
                    partition = message.partition,
                    offset = message.offset,
                    "Spool transfer forwarded"
                );

                self.commit(message, stats).await;
            }
            Outcome::Aborted { stage, reason } => {
                stats.aborted += 1;
                metrics::MESSAGES_ABORTED
                    .with_label_values(&[reason.label()])
                    .inc();

                match &reason {
                    AbortReason::PublishFailure(_) => {
                        error!(
                            stage = %stage,
                            reason = %reason,
                            key = %message.key_lossy(),
                            partition = message.partition,
                            offset = message.offset,
                            "Spool updated but transfer not published; offset NOT committed"
                        );
                        self.redeliver(message, stats).await?;
                        self.pause(shutdown, self.config.redelivery_backoff_ms).await;
                    }
                    AbortReason::Cancelled => {
                        info!(
                            stage = %stage,
                            partition = message.partition,
                            offset = message.offset,
                            "Shutdown interrupted processing; offset NOT committed"
                        );
                    }
                    _ => {
                        warn!(
                            stage = %stage,
                            reason = %reason,
                            key = %message.key_lossy(),
                            partition = message.partition,
                            offset = message.offset,
                            "Spool transfer aborted"
                        );
                        if reason.is_poison() {
                            self.dead_letter(message, stage, &reason, stats).await;
                        }
                        self.commit(message, stats).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn commit(&self, message: &InboundMessage, stats: &mut WorkerStats) {
        let detached = CancellationToken::new();

        match self.transport.commit(&detached, message).await {
            Ok(()) => {
                stats.committed += 1;
                metrics::MESSAGES_COMMITTED.inc();
                debug!(
                    stage = %Stage::Committed,
                    partition = message.partition,
                    offset = message.offset,
                    "Kafka offset committed"
                );
            }
            Err(e) => {
                stats.commit_failures += 1;
                metrics::COMMIT_FAILURES.inc();
                error!(
                    error = %e,
                    partition = message.partition,
                    offset = message.offset,
                    "Failed to commit Kafka offset"
                );
            }
        }
    }

    async fn redeliver(
        &self,
        message: &InboundMessage,
        stats: &mut WorkerStats,
    ) -> Result<(), TransportError> {
        if let Err(e) = self.transport.rewind(message).await {
            error!(
                error = %e,
                partition = message.partition,
                offset = message.offset,
                "Failed to rewind partition; stopping without further commits"
            );
            return Err(e);
        }

        stats.redelivered += 1;
        metrics::MESSAGES_REDELIVERED.inc();
        Ok(())
    }

    async fn dead_letter(
        &self,
        message: &InboundMessage,
        stage: Stage,
        reason: &AbortReason,
        stats: &mut WorkerStats,
    ) {
        let Some(sink) = &self.dead_letters else {
            return;
        };

        let letter = DeadLetterMessage::new(message, stage, reason);
        match sink.send(message.key.as_deref(), &letter).await {
            Ok(()) => {
                stats.dead_lettered += 1;
                metrics::DEAD_LETTERED.inc();
            }
            Err(e) => {
                error!(
                    error = %e,
                    offset = message.offset,
                    payload = %String::from_utf8_lossy(&message.payload),
                    "Failed to dead-letter message"
                );
            }
        }
    }

    async fn pause(&self, shutdown: &CancellationToken, millis: u64) {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_millis(millis)) => {}
        }
    }
}
