//! Persistence writer: the only component that mutates the record store
//!
//! A whole collection cycle is committed as one batch. The writer assigns the
//! write timestamp of the batch and makes sure it never goes backwards for any
//! host, even if the wall clock does.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

use crate::HostMetrics;
use crate::storage::{NewMetricRecord, StorageBackend, StorageError};

/// A host's metrics for the current cycle, waiting to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRecord {
    pub host_id: String,
    pub metrics: HostMetrics,
}

/// The store rejected a cycle; none of its records were written
#[derive(Debug)]
pub struct CommitError(pub StorageError);

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle commit failed: {}", self.0)
    }
}

impl std::error::Error for CommitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[derive(Debug, Default)]
struct WriterState {
    /// Newest timestamp known to be committed
    newest: Option<DateTime<Utc>>,
    loaded: bool,
}

pub struct PersistenceWriter {
    backend: Arc<dyn StorageBackend>,
    state: Mutex<WriterState>,
}

impl PersistenceWriter {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(WriterState::default()),
        }
    }

    /// Commit all records of one cycle as a single atomic batch
    ///
    /// Returns the number of records written. On error the batch is discarded
    /// and not retried.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn commit(&self, records: Vec<StagedRecord>) -> Result<usize, CommitError> {
        if records.is_empty() {
            return Ok(0);
        }

        // held for the whole commit, so batches are written one at a time
        let mut state = self.state.lock().await;

        if !state.loaded {
            state.newest = self.backend.newest_timestamp().await.map_err(|e| {
                error!("failed to read newest committed timestamp: {e}");
                CommitError(e)
            })?;
            state.loaded = true;
        }

        let now = Utc::now().trunc_subsecs(3);
        let timestamp = state.newest.map_or(now, |newest| newest.max(now));

        let count = records.len();
        let batch = records
            .into_iter()
            .map(|record| NewMetricRecord {
                timestamp,
                host_id: record.host_id,
                metrics: record.metrics,
            })
            .collect();

        match self.backend.insert_batch(batch).await {
            Ok(()) => {
                state.newest = Some(timestamp);
                debug!("committed {count} records at {timestamp}");
                Ok(count)
            }
            Err(e) => {
                error!("failed to commit {count} records, discarding batch: {e}");
                Err(CommitError(e))
            }
        }
    }
}
