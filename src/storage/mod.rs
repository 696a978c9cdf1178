//! Storage backends for metric record persistence
//!
//! This module provides a trait-based abstraction for storing metric records.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` trait allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio
//! - **Batch-oriented**: one atomic batch per collection cycle
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database with migrations
//! - **In-Memory**: No persistence, for testing or ephemeral deployments
//!
//! ## Usage
//!
//! ```no_run
//! use fleetwatch::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./metrics.db").await?;
//!     println!("{}", backend.get_stats().await?);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{QueryRange, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use schema::{MetricRecord, NewMetricRecord};

use crate::config::StorageConfig;

/// Open the backend selected by the configuration
pub async fn open_backend(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::None => Ok(Arc::new(memory::MemoryBackend::new())),
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => Ok(Arc::new(sqlite::SqliteBackend::new(path).await?)),
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::ConnectionFailed(
            "built without the storage-sqlite feature".to_string(),
        )),
    }
}
