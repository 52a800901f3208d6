// ============================================================================
// Transfer Processor
// ============================================================================
//
// Runs one inbound message through the transfer state machine:
//
//   Received → Decoded → Validated → Enriched → Updated → Forwarded
//
// 1. Decode the ready event
// 2. Check the target location against a fresh inventory set
// 3. Fetch the spool to capture its current (old) location
// 4. Move the spool
// 5. Publish the complete event under the inbound partition key
//
// Any failure returns `Outcome::Aborted` with the last state reached. The
// processor never commits; `TransferWorker` settles the outcome.
//
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::outcome::{AbortReason, Outcome, Stage};
use crate::events::{self, CompleteEvent, Location};
use crate::inventory::InventoryClient;
use crate::transport::{InboundMessage, Transport};

/// Default bound for publishing a complete event: the producer's default
/// `delivery.timeout.ms` plus its local queue wait
const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(35);

pub struct TransferProcessor {
    inventory: Arc<dyn InventoryClient>,
    transport: Arc<dyn Transport>,
    publish_timeout: Duration,
}

impl TransferProcessor {
    pub fn new(inventory: Arc<dyn InventoryClient>, transport: Arc<dyn Transport>) -> Self {
        Self {
            inventory,
            transport,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Process a single inbound message
    ///
    /// `cancel` aborts inventory calls. Once the spool has been moved, the
    /// complete event is published even if `cancel` fires.
    pub async fn process(&self, message: &InboundMessage, cancel: &CancellationToken) -> Outcome {
        match self.advance(message, cancel).await {
            Ok(event) => Outcome::Forwarded(event),
            Err((stage, reason)) => Outcome::Aborted { stage, reason },
        }
    }

    async fn advance(
        &self,
        message: &InboundMessage,
        cancel: &CancellationToken,
    ) -> Result<CompleteEvent, (Stage, AbortReason)> {
        // Received → Decoded
        let ready = events::decode_ready(&message.payload)
            .map_err(|e| (Stage::Received, AbortReason::from(e)))?;

        debug!(
            spool_id = %ready.spool_id,
            location_id = %ready.location_id,
            offset = message.offset,
            "Decoded spool transfer ready event"
        );

        // Decoded → Validated
        let locations = self
            .inventory
            .list_locations(cancel)
            .await
            .map_err(|e| (Stage::Decoded, AbortReason::from(e)))?;

        if !locations.contains(&ready.location_id) {
            return Err((
                Stage::Decoded,
                AbortReason::Invalid(format!(
                    "location '{}' is not a known inventory location",
                    ready.location_id
                )),
            ));
        }

        // Validated → Enriched
        let spool = self
            .inventory
            .get_spool(cancel, &ready.spool_id)
            .await
            .map_err(|e| (Stage::Validated, AbortReason::from(e)))?;
        let old_location = Location::from_id(spool.location_id);

        debug!(
            spool_id = %ready.spool_id,
            old_location = %old_location.id,
            "Captured spool location before move"
        );

        // Enriched → Updated
        self.inventory
            .update_spool_location(cancel, &ready.spool_id, &ready.location_id)
            .await
            .map_err(|e| (Stage::Enriched, AbortReason::from(e)))?;

        // Updated → Forwarded
        let event = CompleteEvent {
            ready_event: ready,
            old_location,
        };
        self.forward(message, &event)
            .await
            .map_err(|reason| (Stage::Updated, reason))?;

        Ok(event)
    }

    async fn forward(
        &self,
        message: &InboundMessage,
        event: &CompleteEvent,
    ) -> Result<(), AbortReason> {
        let payload = events::encode_complete(event)
            .map_err(|e| AbortReason::PublishFailure(e.to_string()))?;

        // The spool has moved; shutdown must not keep the move unannounced.
        // `publish_timeout` bounds how long a drain can wait on it.
        let detached = CancellationToken::new();
        let publish = self
            .transport
            .publish(&detached, message.key.as_deref(), &payload);

        match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(result) => result.map_err(|e| AbortReason::PublishFailure(e.to_string())),
            Err(_) => Err(AbortReason::PublishFailure(format!(
                "publish timed out after {:?}",
                self.publish_timeout
            ))),
        }
    }
}
