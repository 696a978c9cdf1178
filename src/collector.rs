//! Collection orchestrator
//!
//! One call to [`Collector::run_cycle`] is one collection cycle:
//!
//! ```text
//! Dispatch ──> one task per host ──> 4 chart requests (concurrent) ──> aggregate
//!                                                                         │
//! Barrier  <── wait for every host task (failures become partial records) ┘
//!    │
//!    └──> PersistenceWriter::commit(all records of the cycle)
//! ```
//!
//! A host whose charts are unreachable, or whose arithmetic fails, still
//! yields a record; only the affected fields are null. A cycle never starts
//! while the previous one is still in flight.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::HostMetrics;
use crate::aggregator::{self, Chart, ComputationResult, MetricsBuilder};
use crate::registry::{Host, HostRegistry};
use crate::telemetry::TelemetryClient;
use crate::writer::{PersistenceWriter, StagedRecord};

/// Number of points requested per chart
const POINTS: u32 = 1;

/// Everything a cycle needs, handed over explicitly at construction
pub struct CollectorContext {
    pub registry: HostRegistry,
    pub telemetry: TelemetryClient,
    pub writer: PersistenceWriter,
}

/// Summary of a finished cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Sequence number of the cycle since startup, starting at 1
    pub cycle: u64,

    /// Number of records produced (one per registered host)
    pub hosts: usize,

    /// Records where every metric was collected
    pub complete_records: usize,

    /// Whether the batch reached the store
    pub committed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),

    /// Another cycle was still in flight; nothing was done
    Skipped,
}

pub struct Collector {
    context: Arc<CollectorContext>,

    /// Held for the duration of a cycle; counts finished cycles
    in_flight: Mutex<u64>,
}

impl Collector {
    pub fn new(context: CollectorContext) -> Self {
        Self {
            context: Arc::new(context),
            in_flight: Mutex::new(0),
        }
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.context.registry
    }

    /// Run one collection cycle over all registered hosts
    ///
    /// Returns [`CycleOutcome::Skipped`] right away if a cycle is already
    /// running.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(mut cycle) = self.in_flight.try_lock() else {
            warn!("previous collection cycle still in flight, skipping");
            return CycleOutcome::Skipped;
        };
        *cycle += 1;

        let report = self
            .collect_and_commit(*cycle)
            .instrument(info_span!("cycle", cycle = *cycle))
            .await;

        CycleOutcome::Completed(report)
    }

    async fn collect_and_commit(&self, cycle: u64) -> CycleReport {
        let records = self.dispatch().await;

        let hosts = records.len();
        let complete_records = records.iter().filter(|r| r.metrics.is_complete()).count();

        let committed = match self.context.writer.commit(records).await {
            Ok(count) => {
                info!("cycle committed: {count} records, {complete_records} complete");
                true
            }
            // already logged by the writer
            Err(_) => false,
        };

        CycleReport {
            cycle,
            hosts,
            complete_records,
            committed,
        }
    }

    /// Fan out one task per host and wait for all of them
    ///
    /// Records come back in registry order. A host task that panics is
    /// replaced by an all-null record.
    async fn dispatch(&self) -> Vec<StagedRecord> {
        let handles: Vec<_> = self
            .context
            .registry
            .hosts()
            .iter()
            .map(|host| {
                let context = self.context.clone();
                let host = host.clone();
                tokio::spawn(async move { collect_host(&context.telemetry, &host).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(self.context.registry.hosts())
            .map(|(result, host)| {
                let metrics = result.unwrap_or_else(|e| {
                    error!(host = %host.id, "host collection aborted: {e}");
                    HostMetrics::default()
                });
                StagedRecord {
                    host_id: host.id.clone(),
                    metrics,
                }
            })
            .collect()
    }
}

/// Poll all charts of one host and derive its metrics
///
/// Every metric is derived independently; a missing chart or a failed
/// computation only leaves that metric empty.
#[instrument(skip_all, fields(host = %host.id))]
pub async fn collect_host(telemetry: &TelemetryClient, host: &Host) -> HostMetrics {
    let (cpu, network, memory, disk) = tokio::join!(
        telemetry.fetch(host, Chart::Cpu.name(), POINTS),
        telemetry.fetch(host, Chart::Network.name(), POINTS),
        telemetry.fetch(host, Chart::Memory.name(), POINTS),
        telemetry.fetch(host, Chart::Disk.name(), POINTS),
    );

    let metrics = MetricsBuilder::new()
        .cpu(derive(host, Chart::Cpu, cpu, aggregator::cpu_usage))
        .network(derive(host, Chart::Network, network, aggregator::network_traffic))
        .memory(derive(host, Chart::Memory, memory, aggregator::memory_usage))
        .disk(derive(host, Chart::Disk, disk, aggregator::disk_usage))
        .build();

    if metrics.is_empty() {
        warn!("no metrics could be collected");
    } else {
        debug!("collected metrics: {metrics:?}");
    }

    metrics
}

fn derive<T>(
    host: &Host,
    chart: Chart,
    sample: Option<Vec<f64>>,
    formula: fn(&[f64]) -> ComputationResult<T>,
) -> Option<T> {
    let sample = sample?;
    formula(&sample)
        .inspect_err(|e| error!(host = %host.id, %chart, "failed to compute {chart} metric: {e}"))
        .ok()
}
