//! Forward geocoding: convert free-text queries to coordinates.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use parkscope_core::error::{NetworkError, ReqwestErrorExt};

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "parkscope/0.1 (https://github.com/parkscope)";
const RESULT_LIMIT: usize = 10;

/// One geocoding hit: a labeled coordinate with an optional category.
///
/// Ephemeral: consumed into a suggestion entry or a placed marker, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub label: String,
    pub lat: f64,
    pub lon: f64,
    pub category: Option<String>,
}

/// A provider of forward-geocoding lookups.
///
/// No latency or ordering guarantees; callers must handle out-of-order
/// completion themselves.
pub trait GeocodeProvider: Send + Sync + 'static {
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<SearchResult>, NetworkError>> + Send;
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    /// Nominatim serializes coordinates as strings
    lat: String,
    lon: String,
    #[serde(default)]
    class: Option<String>,
}

/// Nominatim-backed geocoding provider
#[derive(Debug, Clone)]
pub struct NominatimProvider {
    client: Client,
    base_url: String,
}

impl NominatimProvider {
    pub fn new() -> Result<Self, NetworkError> {
        Self::with_base_url(NOMINATIM_URL)
    }

    /// Point the provider at a custom endpoint (tests, self-hosted mirror).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl GeocodeProvider for NominatimProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, NetworkError> {
        let limit = RESULT_LIMIT.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| e.into_network_error())?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;

        let results: Vec<SearchResult> = places
            .into_iter()
            .filter_map(|place| {
                let lat = place.lat.parse::<f64>().ok();
                let lon = place.lon.parse::<f64>().ok();
                match (lat, lon) {
                    (Some(lat), Some(lon)) => Some(SearchResult {
                        label: place.display_name,
                        lat,
                        lon,
                        category: place.class,
                    }),
                    _ => {
                        tracing::debug!(
                            "Dropping geocode hit with unparsable coordinates: {}",
                            place.display_name
                        );
                        None
                    }
                }
            })
            .collect();

        tracing::debug!("Geocoded {:?} to {} results", query, results.len());
        Ok(results)
    }
}
