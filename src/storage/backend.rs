//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{MetricRecord, NewMetricRecord};

/// Query parameters for fetching records within a time range
#[derive(Debug, Clone)]
pub struct QueryRange {
    /// Host to query
    pub host_id: String,

    /// Start of time range (inclusive)
    pub start: DateTime<Utc>,

    /// End of time range (inclusive)
    pub end: DateTime<Utc>,
}

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Trait for metric record stores
///
/// ## Isolation
///
/// `insert_batch` is all-or-nothing. Readers must never observe a batch that
/// is still being written or that failed: implementations either use a
/// database transaction or swap the new rows in only after the whole batch
/// has been validated.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; the collector writes and the query
/// service reads from different tasks at the same time.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Append a batch of records atomically
    ///
    /// Ids are assigned by the store in batch order. On error nothing of the
    /// batch is persisted.
    async fn insert_batch(&self, records: Vec<NewMetricRecord>) -> StorageResult<()>;

    /// Records of one host within `[start, end]`, oldest first
    ///
    /// Records with equal timestamps are ordered by id.
    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<MetricRecord>>;

    /// The newest record (greatest id) of every host in the store
    ///
    /// Returns exactly one record per distinct `host_id`, ordered by host id.
    async fn query_latest_per_host(&self) -> StorageResult<Vec<MetricRecord>>;

    /// Timestamp of the most recently written record, if any
    async fn newest_timestamp(&self) -> StorageResult<Option<DateTime<Utc>>>;

    /// Check backend health
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Get backend-specific statistics
    ///
    /// Returns human-readable stats about the backend
    /// (e.g., "SQLite: 1200 rows, 0.45 MB on disk").
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
