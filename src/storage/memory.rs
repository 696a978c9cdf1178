//! In-memory storage backend (no persistence)
//!
//! Records live in a vector behind a `RwLock`. A batch is validated before
//! the lock is taken and appended in one step under the write lock, so readers
//! see either the whole batch or none of it.
//!
//! Useful for:
//! - Testing without database dependencies
//! - Running the hub with `"storage": {"backend": "none"}`
//!
//! All data is lost on restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, QueryRange, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{MetricRecord, NewMetricRecord};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    records: Vec<MetricRecord>,
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(record: &NewMetricRecord) -> StorageResult<()> {
        if record.host_id.is_empty() {
            return Err(StorageError::InvalidRecord(
                "host_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert_batch(&self, records: Vec<NewMetricRecord>) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        records.iter().try_for_each(Self::validate)?;

        let mut state = self.state.write().await;
        let first_id = state.next_id + 1;
        let staged: Vec<MetricRecord> = records
            .into_iter()
            .zip(first_id..)
            .map(|(record, id)| MetricRecord::from_new(id, record))
            .collect();

        debug!("in-memory backend: appending {} records", staged.len());

        state.next_id += staged.len() as i64;
        state.records.extend(staged);
        Ok(())
    }

    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<MetricRecord>> {
        debug!("querying in-memory storage for {}", query.host_id);

        let state = self.state.read().await;
        let mut records: Vec<MetricRecord> = state
            .records
            .iter()
            .filter(|r| {
                r.host_id == query.host_id && r.timestamp >= query.start && r.timestamp <= query.end
            })
            .cloned()
            .collect();

        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn query_latest_per_host(&self) -> StorageResult<Vec<MetricRecord>> {
        let state = self.state.read().await;

        let mut latest: BTreeMap<&str, &MetricRecord> = BTreeMap::new();
        for record in &state.records {
            latest
                .entry(record.host_id.as_str())
                .and_modify(|current| {
                    if record.id > current.id {
                        *current = record;
                    }
                })
                .or_insert(record);
        }

        Ok(latest.into_values().cloned().collect())
    }

    async fn newest_timestamp(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let state = self.state.read().await;
        Ok(state.records.iter().map(|r| r.timestamp).max())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let total = self.state.read().await.records.len();
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("total_records".to_string(), total.to_string()),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let state = self.state.read().await;
        let hosts: std::collections::HashSet<_> =
            state.records.iter().map(|r| r.host_id.as_str()).collect();

        Ok(format!(
            "In-Memory: {} records across {} hosts",
            state.records.len(),
            hosts.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
