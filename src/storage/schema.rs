//! Persisted record definitions
//!
//! One row of `metric_records` summarizes the derived metrics of one host for
//! one collection cycle. Rows are append-only: they are written once by the
//! persistence writer and never updated or deleted.
//!
//! ```sql
//! CREATE TABLE metric_records (
//!     id               INTEGER PRIMARY KEY AUTOINCREMENT,
//!     timestamp        INTEGER NOT NULL,            -- unix millis, UTC
//!     host_id          TEXT NOT NULL CHECK (host_id <> ''),
//!     cpu_usage_pct    REAL,
//!     memory_usage_pct REAL,
//!     disk_usage_pct   REAL,
//!     network_received REAL,                        -- kbit/s
//!     network_sent     REAL                         -- kbit/s
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::HostMetrics;

/// A record that has been staged for a commit but not written yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewMetricRecord {
    /// Write time assigned by the persistence writer
    pub timestamp: DateTime<Utc>,

    /// Identifier of the host the metrics belong to
    pub host_id: String,

    pub metrics: HostMetrics,
}

/// A committed record as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Monotonic id assigned by the store
    pub id: i64,

    /// When the record was written (always UTC)
    pub timestamp: DateTime<Utc>,

    pub host_id: String,

    #[serde(flatten)]
    pub metrics: HostMetrics,
}

impl MetricRecord {
    pub fn from_new(id: i64, record: NewMetricRecord) -> Self {
        Self {
            id,
            timestamp: record.timestamp,
            host_id: record.host_id,
            metrics: record.metrics,
        }
    }
}
