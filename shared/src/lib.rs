//! Spool transfer relay: consumes "spool transfer ready" events, applies the
//! move against the Spoolman inventory API and republishes a "spool transfer
//! complete" event.

pub mod events;
pub mod inventory;
pub mod kafka;
pub mod metrics;
pub mod pipeline;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use events::{CompleteEvent, Location, ReadyEvent};
pub use inventory::{InventoryClient, InventoryError, SpoolRecord, SpoolmanClient};
pub use pipeline::{Outcome, TransferProcessor, TransferWorker};
pub use transport::{InboundMessage, Transport, TransportError};
