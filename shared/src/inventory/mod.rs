// ============================================================================
// Inventory Client
// ============================================================================
//
// Capability interface over the inventory system of record (Spoolman):
// - list the valid location ids
// - fetch a spool's current state
// - move a spool to a location
//
// Every call takes the shared cancellation token so shutdown aborts in-flight
// requests. Errors are returned to the pipeline, which alone decides whether
// the message gets committed.
//
// ============================================================================

mod client;
pub mod types;

pub use client::SpoolmanClient;

use async_trait::async_trait;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// Network failure, timeout or a server-side error status
    #[error("Inventory API unavailable: {0}")]
    Unavailable(String),

    /// Response body could not be parsed
    #[error("Malformed inventory response: {0}")]
    Malformed(String),

    #[error("Spool not found: {0}")]
    NotFound(String),

    /// The API refused the request (4xx)
    #[error("Inventory API rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Inventory request cancelled")]
    Cancelled,
}

/// The parts of a spool the relay reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolRecord {
    pub spool_id: String,
    /// Current location id; empty when the spool has no location
    pub location_id: String,
}

#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Fetch the full set of valid location ids (no pagination, no caching)
    async fn list_locations(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, InventoryError>;

    async fn get_spool(
        &self,
        cancel: &CancellationToken,
        spool_id: &str,
    ) -> Result<SpoolRecord, InventoryError>;

    /// Move a spool. Re-applying the same location is harmless.
    async fn update_spool_location(
        &self,
        cancel: &CancellationToken,
        spool_id: &str,
        location_id: &str,
    ) -> Result<(), InventoryError>;
}
