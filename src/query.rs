//! Read-only views over the record store
//!
//! The query service never writes. It shapes committed records into the two
//! views served by the HTTP API: the newest record per host, and a time series
//! of one metric for one host.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::storage::{MetricRecord, QueryRange, StorageBackend, StorageError};
use crate::util::round2;

#[derive(Debug)]
pub enum QueryError {
    /// The request is invalid; the store was not touched
    Validation(String),

    /// The store could not answer
    Storage(StorageError),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Validation(msg) => write!(f, "{}", msg),
            QueryError::Storage(err) => write!(f, "storage error: {}", err),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Storage(err) => Some(err),
            QueryError::Validation(_) => None,
        }
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        QueryError::Storage(err)
    }
}

/// Metric selectable for a historical series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl FromStr for MetricKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(MetricKind::Cpu),
            "memory" => Ok(MetricKind::Memory),
            "disk" => Ok(MetricKind::Disk),
            "network" => Ok(MetricKind::Network),
            other => Err(QueryError::Validation(format!(
                "invalid metric type: {other}"
            ))),
        }
    }
}

/// Newest known values of one host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentMetrics {
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: Option<f64>,
    pub network_received: Option<f64>,
    pub network_sent: Option<f64>,
    pub disk_usage: Option<f64>,
    pub memory_usage: Option<f64>,
}

impl From<&MetricRecord> for CurrentMetrics {
    fn from(record: &MetricRecord) -> Self {
        let m = &record.metrics;
        Self {
            timestamp: record.timestamp,
            cpu_usage: m.cpu_usage_pct.map(round2),
            network_received: m.network_received.map(round2),
            network_sent: m.network_sent.map(round2),
            disk_usage: m.disk_usage_pct.map(round2),
            memory_usage: m.memory_usage_pct.map(round2),
        }
    }
}

/// Time series of one metric, ordered by timestamp
///
/// Missing values are reported as `0` so every array has the same length as
/// `timestamps`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HistoricalSeries {
    Single {
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
    },
    Network {
        timestamps: Vec<DateTime<Utc>>,
        sent: Vec<f64>,
        received: Vec<f64>,
    },
}

impl HistoricalSeries {
    fn from_records(kind: MetricKind, records: &[MetricRecord]) -> Self {
        let timestamps = records.iter().map(|r| r.timestamp).collect();

        match kind {
            MetricKind::Network => HistoricalSeries::Network {
                timestamps,
                sent: column(records, |r| r.metrics.network_sent),
                received: column(records, |r| r.metrics.network_received),
            },
            MetricKind::Cpu => HistoricalSeries::Single {
                timestamps,
                values: column(records, |r| r.metrics.cpu_usage_pct.map(round2)),
            },
            MetricKind::Memory => HistoricalSeries::Single {
                timestamps,
                values: column(records, |r| r.metrics.memory_usage_pct.map(round2)),
            },
            MetricKind::Disk => HistoricalSeries::Single {
                timestamps,
                values: column(records, |r| r.metrics.disk_usage_pct.map(round2)),
            },
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HistoricalSeries::Single { timestamps, .. } => timestamps.len(),
            HistoricalSeries::Network { timestamps, .. } => timestamps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn column(records: &[MetricRecord], select: impl Fn(&MetricRecord) -> Option<f64>) -> Vec<f64> {
    records.iter().map(|r| select(r).unwrap_or(0.0)).collect()
}

/// State of the record store as reported by the health endpoint
#[derive(Debug, Clone)]
pub struct StoreHealth {
    pub healthy: bool,
    pub message: String,
    pub stats: String,
}

/// Parse a timestamp given by an API client
///
/// Accepts RFC 3339 (`2025-04-23T02:30:00Z`) as well as the zone-less form
/// browsers send for `datetime-local` inputs (`2025-04-23T02:30`), which is
/// read as UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, QueryError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| QueryError::Validation(format!("invalid timestamp: {input}")))
}

#[derive(Clone)]
pub struct QueryService {
    backend: Arc<dyn StorageBackend>,
}

impl QueryService {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Newest record of every host in the store, keyed by host id
    #[instrument(skip(self))]
    pub async fn latest(&self) -> Result<BTreeMap<String, CurrentMetrics>, QueryError> {
        let records = self.backend.query_latest_per_host().await?;

        debug!("latest metrics for {} hosts", records.len());

        Ok(records
            .iter()
            .map(|record| (record.host_id.clone(), CurrentMetrics::from(record)))
            .collect())
    }

    /// Series of `metric` for `host_id` within `[start, end]`
    ///
    /// The metric name and the range are validated before the store is
    /// queried.
    #[instrument(skip(self))]
    pub async fn historical(
        &self,
        metric: &str,
        host_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoricalSeries, QueryError> {
        let kind: MetricKind = metric.parse()?;

        if start > end {
            return Err(QueryError::Validation(format!(
                "start time {start} is after end time {end}"
            )));
        }

        let records = self
            .backend
            .query_range(QueryRange {
                host_id: host_id.to_string(),
                start,
                end,
            })
            .await?;

        debug!("{} records in range", records.len());

        Ok(HistoricalSeries::from_records(kind, &records))
    }

    pub async fn health(&self) -> Result<StoreHealth, QueryError> {
        let status = self.backend.health_check().await?;
        let stats = self.backend.get_stats().await?;

        Ok(StoreHealth {
            healthy: status.healthy,
            message: status.message,
            stats,
        })
    }
}
