use anyhow::Context;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use spool_relay_config::{InventoryConfig, LocationsSource};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::types::{parse_locations, parse_spool, UpdateLocationRequest};
use super::{InventoryClient, InventoryError, SpoolRecord};
use crate::metrics;

/// HTTP client for the Spoolman inventory API
#[derive(Clone)]
pub struct SpoolmanClient {
    http_client: reqwest::Client,
    base_url: Url,
    locations_source: LocationsSource,
}

impl SpoolmanClient {
    pub fn new(config: &InventoryConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid SPOOLMAN_API_URL '{}'", config.api_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("SPOOLMAN_API_URL '{}' cannot be used as a base URL", config.api_url);
        }

        Ok(Self {
            http_client,
            base_url,
            locations_source: config.locations_source,
        })
    }

    /// Append path segments to the base URL; each segment is percent-encoded
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base() was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request, racing it against cancellation, and read the whole body
    async fn execute(
        &self,
        cancel: &CancellationToken,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), InventoryError> {
        let start = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InventoryError::Cancelled),
            result = async {
                let response = request
                    .send()
                    .await
                    .map_err(|e| InventoryError::Unavailable(e.to_string()))?;
                let status = response.status();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| InventoryError::Unavailable(e.to_string()))?;
                Ok::<_, InventoryError>((status, body.to_vec()))
            } => result,
        };

        metrics::INVENTORY_REQUEST_SECONDS
            .with_label_values(&[operation])
            .observe(start.elapsed().as_secs_f64());

        if let Ok((status, body)) = &result {
            debug!(
                operation = operation,
                status = status.as_u16(),
                body = %String::from_utf8_lossy(body),
                "Spoolman API response"
            );
        }

        result
    }
}

fn unexpected_status(method: &str, url: &Url, status: StatusCode) -> InventoryError {
    InventoryError::Unavailable(format!("{} {} returned HTTP {}", method, url.path(), status))
}

#[async_trait]
impl InventoryClient for SpoolmanClient {
    async fn list_locations(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, InventoryError> {
        let url = self.url(self.locations_source.path().split('/'));
        let (status, body) = self
            .execute(cancel, "list_locations", self.http_client.get(url.clone()))
            .await?;

        if !status.is_success() {
            return Err(unexpected_status("GET", &url, status));
        }

        parse_locations(&body)
    }

    async fn get_spool(
        &self,
        cancel: &CancellationToken,
        spool_id: &str,
    ) -> Result<SpoolRecord, InventoryError> {
        let url = self.url(["spool", spool_id]);
        let (status, body) = self
            .execute(cancel, "get_spool", self.http_client.get(url.clone()))
            .await?;

        if status == StatusCode::NOT_FOUND {
            return Err(InventoryError::NotFound(spool_id.to_string()));
        }
        if !status.is_success() {
            return Err(unexpected_status("GET", &url, status));
        }

        parse_spool(spool_id, &body)
    }

    async fn update_spool_location(
        &self,
        cancel: &CancellationToken,
        spool_id: &str,
        location_id: &str,
    ) -> Result<(), InventoryError> {
        let url = self.url(["spool", spool_id]);
        let request = self
            .http_client
            .patch(url.clone())
            .json(&UpdateLocationRequest {
                location: location_id,
            });

        let (status, body) = self
            .execute(cancel, "update_spool_location", request)
            .await?;

        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            Err(InventoryError::Rejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        } else {
            Err(unexpected_status("PATCH", &url, status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> SpoolmanClient {
        SpoolmanClient::new(&InventoryConfig {
            api_url: api_url.to_string(),
            locations_source: LocationsSource::Setting,
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_url_building() {
        let client = client("http://spoolman:7912/api/v1");
        assert_eq!(
            client.url(["spool", "42"]).as_str(),
            "http://spoolman:7912/api/v1/spool/42"
        );
        assert_eq!(
            client.url(LocationsSource::Setting.path().split('/')).as_str(),
            "http://spoolman:7912/api/v1/setting/locations"
        );
    }

    #[test]
    fn test_url_building_without_path() {
        let client = client("http://spoolman:7912");
        assert_eq!(client.url(["location"]).as_str(), "http://spoolman:7912/location");
    }

    #[test]
    fn test_spool_id_is_encoded_as_one_segment() {
        let client = client("http://spoolman");
        assert_eq!(
            client.url(["spool", "../setting"]).as_str(),
            "http://spoolman/spool/..%2Fsetting"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = SpoolmanClient::new(&InventoryConfig {
            api_url: "mailto:ops@example.com".to_string(),
            locations_source: LocationsSource::Location,
            request_timeout_secs: 5,
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_request_returns_promptly() {
        // Unroutable address; an already-cancelled token must win without a connect attempt
        let client = client("http://10.255.255.1:9");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.list_locations(&cancel).await;
        assert_eq!(result, Err(InventoryError::Cancelled));
    }
}
