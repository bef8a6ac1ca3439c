use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::Deserialize;
use url::Url;

use parkscope_core::error::{NetworkError, ReqwestErrorExt};
use parkscope_core::session::SessionToken;
use parkscope_state::types::{datetime_from_millis, ForecastPoint, SpotRecord, SpotStatus};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "parkscope/0.1";

/// Wire representation of a spot from `GET /api/spots/`
#[derive(Debug, Deserialize)]
struct RawSpot {
    spot_id: i64,
    status: String,
    /// Unix epoch milliseconds
    timestamp: i64,
}

/// Wire representation of a forecast entry from `GET /api/forecast/`
#[derive(Debug, Deserialize)]
struct RawForecast {
    yhat: f64,
}

/// REST client for the spots and forecast endpoints
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    base_url: Url,
    client: Client,
}

impl SnapshotClient {
    /// Create a new client for the given backend base URL.
    pub fn new(base_url: &str) -> Result<Self, NetworkError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| NetworkError::InvalidResponse(format!("invalid base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self { base_url, client })
    }

    /// Build request with the backend's token auth header
    fn build_request(
        &self,
        req: reqwest::RequestBuilder,
        token: &SessionToken,
    ) -> reqwest::RequestBuilder {
        req.header(header::AUTHORIZATION, format!("Token {}", token.expose()))
            .header(header::ACCEPT, "application/json")
    }

    /// Check response status and extract error
    async fn check_response(&self, response: Response) -> Result<Response, NetworkError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Fetch the full spot snapshot.
    ///
    /// The result is meant for `SpotStore::replace_all`: the backend is
    /// authoritative for completeness, so the whole set comes back in one
    /// pull. Entries with an unrecognized status or an unrepresentable
    /// timestamp are dropped individually with a diagnostic; a body that
    /// is not a spot array fails the call.
    pub async fn fetch_spots(&self, token: &SessionToken) -> Result<Vec<SpotRecord>, NetworkError> {
        tracing::debug!("Fetching spot snapshot");

        let url = self
            .base_url
            .join("api/spots/")
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;
        let request = self.build_request(self.client.get(url), token);

        let response = request.send().await.map_err(|e| e.into_network_error())?;
        let response = self.check_response(response).await?;

        let raw: Vec<RawSpot> = response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;

        let total = raw.len();
        let records: Vec<SpotRecord> = raw.into_iter().filter_map(normalize_spot).collect();

        if records.len() < total {
            tracing::warn!(
                "Dropped {} malformed spot entries from snapshot",
                total - records.len()
            );
        }
        tracing::info!("Fetched {} spots", records.len());
        Ok(records)
    }

    /// Fetch the one-hour occupancy forecast.
    ///
    /// The endpoint returns a list of predictions; only the first entry is
    /// consumed. An empty list or a missing `yhat` field is a malformed
    /// response.
    pub async fn fetch_forecast(&self, token: &SessionToken) -> Result<ForecastPoint, NetworkError> {
        tracing::debug!("Fetching occupancy forecast");

        let url = self
            .base_url
            .join("api/forecast/")
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;
        let request = self.build_request(self.client.get(url), token);

        let response = request.send().await.map_err(|e| e.into_network_error())?;
        let response = self.check_response(response).await?;

        let raw: Vec<RawForecast> = response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;

        let first = raw
            .first()
            .ok_or_else(|| NetworkError::InvalidResponse("empty forecast list".to_string()))?;

        Ok(ForecastPoint {
            predicted_occupied: first.yhat,
        })
    }
}

/// Convert a wire spot into a typed record, or drop it with a diagnostic.
fn normalize_spot(raw: RawSpot) -> Option<SpotRecord> {
    let status = match SpotStatus::parse(&raw.status) {
        Some(status) => status,
        None => {
            tracing::warn!(
                "Dropping spot {}: unrecognized status {:?}",
                raw.spot_id,
                raw.status
            );
            return None;
        }
    };
    let updated_at = match datetime_from_millis(raw.timestamp) {
        Some(dt) => dt,
        None => {
            tracing::warn!(
                "Dropping spot {}: unrepresentable timestamp {}",
                raw.spot_id,
                raw.timestamp
            );
            return None;
        }
    };
    Some(SpotRecord::new(raw.spot_id, status, updated_at))
}
