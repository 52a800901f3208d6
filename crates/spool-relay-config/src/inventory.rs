// ============================================================================
// Inventory (Spoolman) API Configuration
// ============================================================================

use crate::constants::*;

/// Which endpoint lists the valid inventory locations
///
/// Spoolman deployments expose either a dedicated `/location` endpoint or a
/// `locations` setting. The response parser accepts both body shapes either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationsSource {
    /// `GET {base}/location`
    Location,
    /// `GET {base}/setting/locations`
    Setting,
}

impl LocationsSource {
    /// Path relative to the API base URL
    pub fn path(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Setting => "setting/locations",
        }
    }
}

impl std::str::FromStr for LocationsSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "location" | "locations" => Ok(Self::Location),
            "setting" | "settings" => Ok(Self::Setting),
            _ => anyhow::bail!(
                "Invalid INVENTORY_LOCATIONS_SOURCE: {}. Must be 'location' or 'setting'",
                s
            ),
        }
    }
}

/// Inventory API client configuration
#[derive(Clone, Debug)]
pub struct InventoryConfig {
    /// Base URL of the Spoolman API (e.g., "http://spoolman:7912/api/v1")
    pub api_url: String,
    pub locations_source: LocationsSource,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl InventoryConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let api_url = std::env::var("SPOOLMAN_API_URL")
            .map_err(|_| anyhow::anyhow!("SPOOLMAN_API_URL must be set"))?;

        let locations_source = match std::env::var("INVENTORY_LOCATIONS_SOURCE") {
            Ok(v) => v.parse()?,
            Err(_) => LocationsSource::Location,
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            locations_source,
            request_timeout_secs: std::env::var("INVENTORY_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_INVENTORY_REQUEST_TIMEOUT_SECS),
        })
    }

    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!(
                "SPOOLMAN_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            );
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("INVENTORY_REQUEST_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }
}
