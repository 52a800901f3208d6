// ============================================================================
// Spool Transfer Events
// ============================================================================
//
// Wire format for the two event shapes the relay handles. Both are plain JSON
// objects with no version field.
//
// Ready:    {"spool_id":"42","location_id":"shelf-3"}
// Complete: {"spool_id":"42","location_id":"shelf-3",
//            "old_location":{"id":"shelf-1","name":"shelf-1"}}
//
// ============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed event: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Inbound event: a spool should move to `location_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyEvent {
    pub spool_id: String,
    pub location_id: String,
}

impl ReadyEvent {
    /// Validate required fields
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.spool_id.trim().is_empty() {
            return Err(CodecError::Malformed("spool_id is required".to_string()));
        }
        if self.location_id.trim().is_empty() {
            return Err(CodecError::Malformed("location_id is required".to_string()));
        }
        Ok(())
    }
}

/// An inventory location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
}

impl Location {
    /// Build a location from its id alone.
    ///
    /// Spoolman has no separate location names, so the name mirrors the id.
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
        }
    }
}

/// Outbound event: the move has been applied
///
/// The ready event's fields are flattened into the top-level object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteEvent {
    #[serde(flatten)]
    pub ready_event: ReadyEvent,
    /// Where the spool was before the update
    pub old_location: Location,
}

pub fn decode_ready(bytes: &[u8]) -> Result<ReadyEvent, CodecError> {
    let event: ReadyEvent = serde_json::from_slice(bytes)?;
    event.validate()?;
    Ok(event)
}

pub fn encode_ready(event: &ReadyEvent) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(event)?)
}

pub fn encode_complete(event: &CompleteEvent) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(event)?)
}

pub fn decode_complete(bytes: &[u8]) -> Result<CompleteEvent, CodecError> {
    let event: CompleteEvent = serde_json::from_slice(bytes)?;
    event.ready_event.validate()?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_event_wire_format() {
        let event = CompleteEvent {
            ready_event: ReadyEvent {
                spool_id: "42".to_string(),
                location_id: "shelf-3".to_string(),
            },
            old_location: Location::from_id("shelf-1"),
        };

        let bytes = encode_complete(&event).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"spool_id":"42","location_id":"shelf-3","old_location":{"id":"shelf-1","name":"shelf-1"}}"#
        );
    }

    #[test]
    fn test_decode_ready() {
        let event = decode_ready(br#"{"spool_id":"42","location_id":"shelf-3"}"#).unwrap();
        assert_eq!(event.spool_id, "42");
        assert_eq!(event.location_id, "shelf-3");
    }

    #[test]
    fn test_decode_ready_ignores_unknown_fields() {
        let event =
            decode_ready(br#"{"spool_id":"7","location_id":"dryer","source":"scale-1"}"#).unwrap();
        assert_eq!(event.spool_id, "7");
    }

    #[test]
    fn test_decode_ready_rejects_garbage() {
        assert!(decode_ready(b"not json").is_err());
        assert!(decode_ready(b"").is_err());
        assert!(decode_ready(br#"{"spool_id":"42"}"#).is_err());
        // Numeric ids are not accepted; the contract is string ids
        assert!(decode_ready(br#"{"spool_id":42,"location_id":"shelf-3"}"#).is_err());
    }

    #[test]
    fn test_decode_ready_rejects_empty_fields() {
        let err = decode_ready(br#"{"spool_id":"","location_id":"shelf-3"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Malformed event: spool_id is required");

        let err = decode_ready(br#"{"spool_id":"42","location_id":"  "}"#).unwrap_err();
        assert_eq!(err.to_string(), "Malformed event: location_id is required");
    }

    #[test]
    fn test_ready_round_trip() {
        let input = br#"{"spool_id":"42","location_id":"shelf-3"}"#;
        let event = decode_ready(input).unwrap();
        assert_eq!(encode_ready(&event).unwrap(), input.to_vec());
    }

    #[test]
    fn test_complete_round_trip() {
        let event = CompleteEvent {
            ready_event: ReadyEvent {
                spool_id: "9".to_string(),
                location_id: "drybox".to_string(),
            },
            old_location: Location {
                id: "".to_string(),
                name: "".to_string(),
            },
        };

        let decoded = decode_complete(&encode_complete(&event).unwrap()).unwrap();
        assert_eq!(decoded, event);
    }
}
