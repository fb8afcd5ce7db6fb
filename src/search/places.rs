//! Google Places Nearby Search client.
//!
//! Issues `GET {endpoint}?location=..&radius=..&keyword=..&key=..` and maps
//! the provider `status` field onto transient/permanent errors.

use super::PlacesSearch;
use crate::error::SearchError;
use crate::models::{Coordinate, Place};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default Nearby Search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";

/// Maximum length of a response body echoed into an error.
const BODY_PREVIEW_LEN: usize = 300;

/// Settings for the Places client.
#[derive(Debug, Clone)]
pub struct PlacesClientConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

impl Default for PlacesClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            timeout_seconds: 30,
        }
    }
}

/// Nearby Search response body.
#[derive(Debug, Deserialize)]
struct NearbySearchResponse {
    #[serde(default)]
    results: Vec<NearbyPlace>,
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyPlace {
    place_id: String,
    #[serde(default)]
    name: String,
}

/// HTTP client for the Places Nearby Search API.
pub struct GooglePlacesClient {
    config: PlacesClientConfig,
    http_client: reqwest::Client,
}

impl GooglePlacesClient {
    pub fn new(config: PlacesClientConfig) -> Result<Self, SearchError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SearchError::Permanent(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl PlacesSearch for GooglePlacesClient {
    async fn search(
        &self,
        location: Coordinate,
        radius_meters: u32,
        term: &str,
    ) -> Result<Vec<Place>, SearchError> {
        let location_param = format!("{},{}", location.lat, location.lng);
        let radius_param = radius_meters.to_string();

        debug!("Nearby search '{}' at {} within {}m", term, location_param, radius_meters);

        let response = self
            .http_client
            .get(&self.config.endpoint)
            .query(&[
                ("location", location_param.as_str()),
                ("radius", radius_param.as_str()),
                ("keyword", term),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Transient(format!(
                        "Request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else if e.is_connect() {
                    SearchError::Transient(format!(
                        "Cannot connect to {}",
                        self.config.endpoint
                    ))
                } else {
                    SearchError::Transient(format!("Failed to send request: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Transient(format!("Failed to read response body: {}", e)))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(SearchError::Transient(format!("Places API HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(SearchError::Permanent(format!(
                "Places API HTTP {}: {}",
                status,
                preview(&body)
            )));
        }

        parse_nearby_response(&body)
    }
}

/// Parse a Nearby Search body into provider-ordered places.
pub fn parse_nearby_response(body: &str) -> Result<Vec<Place>, SearchError> {
    let parsed: NearbySearchResponse = serde_json::from_str(body).map_err(|e| {
        SearchError::Permanent(format!(
            "Malformed Places response: {} (body: {})",
            e,
            preview(body)
        ))
    })?;

    let detail = parsed.error_message.unwrap_or_default();

    match parsed.status.as_str() {
        "OK" => Ok(parsed
            .results
            .into_iter()
            .map(|p| Place {
                business_id: p.place_id,
                name: p.name,
            })
            .collect()),
        "ZERO_RESULTS" => Ok(Vec::new()),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(SearchError::Transient(format!(
            "Places API status {} {}",
            parsed.status, detail
        ))),
        other => Err(SearchError::Permanent(format!(
            "Places API status {} {}",
            other, detail
        ))),
    }
}

fn preview(body: &str) -> String {
    if body.len() > BODY_PREVIEW_LEN {
        let cut = (0..=BODY_PREVIEW_LEN)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixture_preserves_order() {
        let body = include_str!("../../fixtures/nearby_search.json");
        let places = parse_nearby_response(body).unwrap();

        assert_eq!(places.len(), 3);
        assert_eq!(places[0].business_id, "ChIJ-blue-bottle");
        assert_eq!(places[1].name, "Ritual Coffee Roasters");
        assert_eq!(places[2].business_id, "ChIJ-sightglass");
    }

    #[test]
    fn test_zero_results_is_empty() {
        let places = parse_nearby_response(r#"{"results": [], "status": "ZERO_RESULTS"}"#).unwrap();
        assert!(places.is_empty());
    }

    #[test]
    fn test_status_classification() {
        let throttled =
            parse_nearby_response(r#"{"results": [], "status": "OVER_QUERY_LIMIT"}"#).unwrap_err();
        assert!(throttled.is_transient());

        let denied = parse_nearby_response(
            r#"{"results": [], "status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#,
        )
        .unwrap_err();
        assert!(!denied.is_transient());
        assert!(denied.to_string().contains("API key is invalid"));
    }

    #[test]
    fn test_malformed_body_is_permanent() {
        let err = parse_nearby_response("<html>Bad Gateway</html>").unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Malformed"));
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(1000);
        assert_eq!(preview(&long).len(), BODY_PREVIEW_LEN + 3);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_client_builds() {
        let client = GooglePlacesClient::new(PlacesClientConfig::default());
        assert!(client.is_ok());
    }
}
