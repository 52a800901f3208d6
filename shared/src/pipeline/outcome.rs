use std::fmt;

use crate::events::{CodecError, CompleteEvent};
use crate::inventory::InventoryError;

/// Per-message processing states, in order
///
/// `Received → Decoded → Validated → Enriched → Updated → Forwarded → Committed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Decoded,
    Validated,
    Enriched,
    Updated,
    Forwarded,
    Committed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Decoded => "decoded",
            Self::Validated => "validated",
            Self::Enriched => "enriched",
            Self::Updated => "updated",
            Self::Forwarded => "forwarded",
            Self::Committed => "committed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why processing of a message stopped short of `Forwarded`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Inventory API unreachable or failing
    Transient(String),
    /// Payload or API response could not be parsed
    Malformed(String),
    /// The event references data the inventory does not know
    Invalid(String),
    /// The update was applied but the complete event was not published
    PublishFailure(String),
    /// Shutdown interrupted processing before the update was applied
    Cancelled,
}

impl AbortReason {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::Malformed(_) => "malformed",
            Self::Invalid(_) => "invalid",
            Self::PublishFailure(_) => "publish_failure",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the inbound message is committed after this abort.
    ///
    /// Only a publish failure (update applied, not announced) and an
    /// interrupted shutdown leave the message for redelivery.
    pub fn commits(&self) -> bool {
        !matches!(self, Self::PublishFailure(_) | Self::Cancelled)
    }

    /// Messages that can never succeed and are worth dead-lettering
    pub fn is_poison(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Invalid(_))
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(detail) => write!(f, "transient: {}", detail),
            Self::Malformed(detail) => write!(f, "malformed: {}", detail),
            Self::Invalid(detail) => write!(f, "invalid: {}", detail),
            Self::PublishFailure(detail) => write!(f, "publish failure: {}", detail),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl From<InventoryError> for AbortReason {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::Unavailable(_) => Self::Transient(e.to_string()),
            InventoryError::Malformed(_) => Self::Malformed(e.to_string()),
            InventoryError::NotFound(_) | InventoryError::Rejected { .. } => {
                Self::Invalid(e.to_string())
            }
            InventoryError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<CodecError> for AbortReason {
    fn from(e: CodecError) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Result of running one message through the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The complete event was published; the message is ready to commit
    Forwarded(CompleteEvent),
    /// Processing stopped; `stage` is the last state the message reached
    Aborted { stage: Stage, reason: AbortReason },
}

impl Outcome {
    pub fn commits(&self) -> bool {
        match self {
            Self::Forwarded(_) => true,
            Self::Aborted { reason, .. } => reason.commits(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Forwarded(_) => Stage::Forwarded,
            Self::Aborted { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_policy() {
        assert!(AbortReason::Transient("down".into()).commits());
        assert!(AbortReason::Malformed("bad".into()).commits());
        assert!(AbortReason::Invalid("unknown".into()).commits());
        assert!(!AbortReason::PublishFailure("broker".into()).commits());
        assert!(!AbortReason::Cancelled.commits());
    }

    #[test]
    fn test_only_poison_is_dead_lettered() {
        assert!(AbortReason::Malformed("bad".into()).is_poison());
        assert!(AbortReason::Invalid("unknown".into()).is_poison());
        assert!(!AbortReason::Transient("down".into()).is_poison());
        assert!(!AbortReason::PublishFailure("broker".into()).is_poison());
    }

    #[test]
    fn test_inventory_error_classification() {
        assert_eq!(
            AbortReason::from(InventoryError::Unavailable("timeout".into())).label(),
            "transient"
        );
        assert_eq!(
            AbortReason::from(InventoryError::Malformed("eof".into())).label(),
            "malformed"
        );
        assert_eq!(
            AbortReason::from(InventoryError::NotFound("42".into())).label(),
            "invalid"
        );
        assert_eq!(
            AbortReason::from(InventoryError::Rejected {
                status: 422,
                body: "{}".into()
            })
            .label(),
            "invalid"
        );
        assert_eq!(
            AbortReason::from(InventoryError::Cancelled),
            AbortReason::Cancelled
        );
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Received < Stage::Decoded);
        assert!(Stage::Updated < Stage::Forwarded);
        assert_eq!(Stage::Enriched.to_string(), "enriched");
    }
}
