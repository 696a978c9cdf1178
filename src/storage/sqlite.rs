//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `StorageBackend` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers keep going while a cycle is committed
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! Every batch is written inside one transaction. If any row is rejected the
//! transaction is dropped without commit and SQLite rolls the whole batch back.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, QueryRange, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{MetricRecord, NewMetricRecord};
use crate::HostMetrics;

const RECORD_COLUMNS: &str = "id, timestamp, host_id, cpu_usage_pct, memory_usage_pct, \
     disk_usage_pct, network_received, network_sent";

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for WAL mode
    ///
    /// ```no_run
    /// # use fleetwatch::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./metrics.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Helper to convert timestamp to Unix milliseconds for SQLite
    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    /// Smallest stored millisecond that is not before `dt`
    fn timestamp_to_millis_ceil(dt: &DateTime<Utc>) -> i64 {
        let millis = dt.timestamp_millis();
        if dt.timestamp_subsec_nanos() % 1_000_000 == 0 {
            millis
        } else {
            millis + 1
        }
    }

    /// Helper to convert Unix milliseconds from SQLite to DateTime
    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            StorageError::QueryFailed(format!("timestamp {} is out of range", millis))
        })
    }

    fn record_from_row(row: &SqliteRow) -> StorageResult<MetricRecord> {
        Ok(MetricRecord {
            id: row.try_get("id")?,
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?)?,
            host_id: row.try_get("host_id")?,
            metrics: HostMetrics {
                cpu_usage_pct: row.try_get("cpu_usage_pct")?,
                memory_usage_pct: row.try_get("memory_usage_pct")?,
                disk_usage_pct: row.try_get("disk_usage_pct")?,
                network_received: row.try_get("network_received")?,
                network_sent: row.try_get("network_sent")?,
            },
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn insert_batch(&self, records: Vec<NewMetricRecord>) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        debug!("inserting {} records into SQLite", records.len());

        let mut tx = self.pool.begin().await?;

        for record in records {
            let metrics = record.metrics;

            // an error drops `tx` uncommitted, which rolls the batch back
            sqlx::query(
                r#"
                INSERT INTO metric_records (
                    timestamp, host_id, cpu_usage_pct, memory_usage_pct,
                    disk_usage_pct, network_received, network_sent
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Self::timestamp_to_millis(&record.timestamp))
            .bind(&record.host_id)
            .bind(metrics.cpu_usage_pct)
            .bind(metrics.memory_usage_pct)
            .bind(metrics.disk_usage_pct)
            .bind(metrics.network_received)
            .bind(metrics.network_sent)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::TransactionRejected(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionRejected(e.to_string()))?;

        debug!("batch insert complete");
        Ok(())
    }

    #[instrument(skip(self), fields(host_id = %query.host_id))]
    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<MetricRecord>> {
        debug!(
            "querying records for {} from {} to {}",
            query.host_id, query.start, query.end
        );

        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM metric_records
            WHERE host_id = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC, id ASC
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(&query.host_id)
            .bind(Self::timestamp_to_millis_ceil(&query.start))
            .bind(Self::timestamp_to_millis(&query.end))
            .fetch_all(&self.pool)
            .await?;

        let records = rows
            .iter()
            .map(Self::record_from_row)
            .collect::<StorageResult<Vec<_>>>()?;

        debug!("query returned {} records", records.len());
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn query_latest_per_host(&self) -> StorageResult<Vec<MetricRecord>> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM metric_records
            WHERE id IN (
                SELECT MAX(id) FROM metric_records GROUP BY host_id
            )
            ORDER BY host_id ASC
            "#
        );

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn newest_timestamp(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let newest: (Option<i64>,) = sqlx::query_as("SELECT MAX(timestamp) FROM metric_records")
            .fetch_one(&self.pool)
            .await?;

        newest.0.map(Self::millis_to_timestamp).transpose()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (total_rows, oldest, newest): (i64, Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM metric_records",
        )
        .fetch_one(&self.pool)
        .await?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        let file_size_mb = file_size as f64 / 1_000_000.0;

        let time_range = match (oldest, newest) {
            (Some(old), Some(new)) => format!(
                "{} to {}",
                Self::millis_to_timestamp(old)?.format("%Y-%m-%d"),
                Self::millis_to_timestamp(new)?.format("%Y-%m-%d")
            ),
            _ => "no data".to_string(),
        };

        Ok(format!(
            "SQLite: {} rows, {:.2} MB on disk, time range: {}",
            total_rows, file_size_mb, time_range
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
