//! Transfer pipeline: per-message state machine and the worker loop that
//! settles each outcome against the broker.

mod dead_letter;
mod outcome;
mod processor;
mod worker;

pub use dead_letter::{DeadLetterMessage, DeadLetterSink, KafkaDeadLetterSink};
pub use outcome::{AbortReason, Outcome, Stage};
pub use processor::TransferProcessor;
pub use worker::{TransferWorker, WorkerStats};
