//! Response bodies returned by the Spoolman API.

use super::{InventoryError, SpoolRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The two shapes a location listing comes back in
///
/// - a bare array: `["shelf-1","shelf-2"]`
/// - a settings wrapper whose `value` is a JSON-encoded array:
///   `{"value":"[\"shelf-1\",\"shelf-2\"]","is_set":true,"type":"array"}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocationsBody {
    List(Vec<String>),
    Setting { value: serde_json::Value },
}

pub fn parse_locations(body: &[u8]) -> Result<HashSet<String>, InventoryError> {
    let parsed: LocationsBody = serde_json::from_slice(body)
        .map_err(|e| InventoryError::Malformed(format!("location list: {}", e)))?;

    let locations: Vec<String> = match parsed {
        LocationsBody::List(list) => list,
        LocationsBody::Setting { value } => match value {
            serde_json::Value::String(encoded) => serde_json::from_str(&encoded).map_err(|e| {
                InventoryError::Malformed(format!("locations setting value: {}", e))
            })?,
            // Some servers already decode the setting value
            other @ serde_json::Value::Array(_) => serde_json::from_value(other).map_err(|e| {
                InventoryError::Malformed(format!("locations setting value: {}", e))
            })?,
            other => {
                return Err(InventoryError::Malformed(format!(
                    "locations setting value must be an array, got {}",
                    other
                )))
            }
        },
    };

    Ok(locations.into_iter().collect())
}

#[derive(Debug, Deserialize)]
struct SpoolBody {
    #[serde(default, alias = "location_id")]
    location: Option<String>,
}

pub fn parse_spool(spool_id: &str, body: &[u8]) -> Result<SpoolRecord, InventoryError> {
    let parsed: SpoolBody = serde_json::from_slice(body)
        .map_err(|e| InventoryError::Malformed(format!("spool {}: {}", spool_id, e)))?;

    Ok(SpoolRecord {
        spool_id: spool_id.to_string(),
        location_id: parsed.location.unwrap_or_default(),
    })
}

/// Body of `PATCH /spool/{id}`
#[derive(Debug, Serialize)]
pub struct UpdateLocationRequest<'a> {
    pub location: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_bare_array() {
        let locations = parse_locations(br#"["shelf-3","shelf-4"]"#).unwrap();
        assert_eq!(locations, set(&["shelf-3", "shelf-4"]));
    }

    #[test]
    fn test_parse_settings_wrapper() {
        let body = br#"{"value":"[\"shelf-3\",\"drybox\"]","is_set":true,"type":"array"}"#;
        let locations = parse_locations(body).unwrap();
        assert_eq!(locations, set(&["shelf-3", "drybox"]));
    }

    #[test]
    fn test_parse_settings_wrapper_with_decoded_value() {
        let locations = parse_locations(br#"{"value":["a","b"]}"#).unwrap();
        assert_eq!(locations, set(&["a", "b"]));
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_locations(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_locations_malformed() {
        assert!(matches!(
            parse_locations(b"<html>"),
            Err(InventoryError::Malformed(_))
        ));
        assert!(matches!(
            parse_locations(br#"{"value":"not an array"}"#),
            Err(InventoryError::Malformed(_))
        ));
        assert!(matches!(
            parse_locations(br#"{"value":42}"#),
            Err(InventoryError::Malformed(_))
        ));
        assert!(matches!(
            parse_locations(br#"[1,2]"#),
            Err(InventoryError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_spool() {
        let body = br#"{"id":42,"location":"shelf-1","remaining_weight":812.5,"filament":{"id":3}}"#;
        let spool = parse_spool("42", body).unwrap();
        assert_eq!(spool.spool_id, "42");
        assert_eq!(spool.location_id, "shelf-1");
    }

    #[test]
    fn test_parse_spool_without_location() {
        let spool = parse_spool("7", br#"{"id":7,"location":null}"#).unwrap();
        assert_eq!(spool.location_id, "");

        let spool = parse_spool("7", br#"{"id":7}"#).unwrap();
        assert_eq!(spool.location_id, "");
    }

    #[test]
    fn test_parse_spool_malformed() {
        assert!(matches!(
            parse_spool("7", b"not json"),
            Err(InventoryError::Malformed(_))
        ));
        assert!(matches!(
            parse_spool("7", br#"{"id":7,"location":5}"#),
            Err(InventoryError::Malformed(_))
        ));
    }

    #[test]
    fn test_update_request_body() {
        let body = serde_json::to_string(&UpdateLocationRequest { location: "shelf-3" }).unwrap();
        assert_eq!(body, r#"{"location":"shelf-3"}"#);
    }
}
