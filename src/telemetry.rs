//! Telemetry client for Netdata-style `/api/v1/data` endpoints
//!
//! A single request is issued per (host, chart) pair. The client never returns
//! an error to the collector: every failure is logged with host and chart
//! context and surfaces as "no data".
//!
//! ## Wire format
//!
//! ```text
//! GET {endpoint}/api/v1/data?chart={chart}&points={points}&format=json
//!
//! {"labels": ["time", "received", "sent"], "data": [[1745376000, 15.5, -16.5]]}
//! ```
//!
//! Only the last tuple of `data` is used and its leading timestamp is dropped.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, instrument};

use crate::registry::Host;

/// Timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a telemetry request produced no sample
#[derive(Debug)]
pub enum TelemetryError {
    /// Timeout, refused connection, DNS failure, broken body
    Transport(reqwest::Error),

    /// The endpoint answered with a non-success status
    Status(reqwest::StatusCode),

    /// The body is not the expected JSON document
    Malformed(String),

    /// The document has no `data` rows
    NoData,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Transport(err) if err.is_timeout() => {
                write!(f, "request timed out: {}", err)
            }
            TelemetryError::Transport(err) if err.is_connect() => {
                write!(f, "connection failed: {}", err)
            }
            TelemetryError::Transport(err) => write!(f, "request failed: {}", err),
            TelemetryError::Status(status) => write!(f, "HTTP error: {}", status),
            TelemetryError::Malformed(msg) => write!(f, "malformed response: {}", msg),
            TelemetryError::NoData => write!(f, "response contains no data"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TelemetryError {
    fn from(err: reqwest::Error) -> Self {
        TelemetryError::Transport(err)
    }
}

#[derive(Debug, Deserialize)]
struct DataResponse {
    #[serde(default)]
    data: Option<Vec<Vec<serde_json::Value>>>,
}

/// Build the request URL for one chart
pub fn data_url(endpoint: &str, chart: &str, points: u32) -> String {
    format!(
        "{}/api/v1/data?chart={chart}&points={points}&format=json",
        endpoint.trim_end_matches('/')
    )
}

/// Extract the most recent sample from a response body
///
/// Returns the values of the last tuple without its timestamp column.
pub fn parse_latest_sample(body: &str) -> Result<Vec<f64>, TelemetryError> {
    let response: DataResponse =
        serde_json::from_str(body).map_err(|e| TelemetryError::Malformed(e.to_string()))?;

    let rows = response.data.unwrap_or_default();
    let last = rows.last().ok_or(TelemetryError::NoData)?;

    let values = last.get(1..).unwrap_or_default();
    if values.is_empty() {
        return Err(TelemetryError::Malformed(
            "latest row holds no values".to_string(),
        ));
    }

    values
        .iter()
        .enumerate()
        .map(|(column, value)| {
            value.as_f64().ok_or_else(|| {
                TelemetryError::Malformed(format!("column {} is not a number: {}", column + 1, value))
            })
        })
        .collect()
}

/// HTTP client for telemetry endpoints
///
/// The underlying `reqwest::Client` is built once and reused for every
/// request of every cycle.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    client: reqwest::Client,
}

impl TelemetryClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetch the latest sample of `chart` from `host`
    ///
    /// Any failure is logged and reported as `None`.
    pub async fn fetch(&self, host: &Host, chart: &str, points: u32) -> Option<Vec<f64>> {
        match self.try_fetch(host, chart, points).await {
            Ok(sample) => Some(sample),
            Err(e) => {
                error!(host = %host.id, chart, "error retrieving {chart} from {}: {e}", host.endpoint);
                None
            }
        }
    }

    /// Fetch the latest sample of `chart` from `host`, keeping the failure reason
    #[instrument(skip(self, host), fields(host = %host.id))]
    pub async fn try_fetch(
        &self,
        host: &Host,
        chart: &str,
        points: u32,
    ) -> Result<Vec<f64>, TelemetryError> {
        let url = data_url(&host.endpoint, chart, points);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(TelemetryError::Status(response.status()));
        }

        let body = response.text().await?;
        parse_latest_sample(&body)
    }
}
