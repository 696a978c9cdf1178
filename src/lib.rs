pub mod aggregator;
pub mod collector;
pub mod config;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
pub mod util;
pub mod writer;

#[cfg(feature = "api")]
pub mod api;

use serde::{Deserialize, Serialize};

/// Derived usage metrics of one host for one collection cycle.
///
/// Every field is optional: `None` means the value could not be retrieved or
/// computed during the cycle. It never stands for an observed zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMetrics {
    /// Sum of all CPU state percentages
    pub cpu_usage_pct: Option<f64>,

    /// Used RAM relative to free + used + cached + buffers
    pub memory_usage_pct: Option<f64>,

    /// Used + reserved space relative to the whole filesystem
    pub disk_usage_pct: Option<f64>,

    /// Inbound traffic in kbit/s
    pub network_received: Option<f64>,

    /// Outbound traffic in kbit/s (always non-negative)
    pub network_sent: Option<f64>,
}

impl HostMetrics {
    /// Whether every metric of this record was collected
    pub fn is_complete(&self) -> bool {
        self.cpu_usage_pct.is_some()
            && self.memory_usage_pct.is_some()
            && self.disk_usage_pct.is_some()
            && self.network_received.is_some()
            && self.network_sent.is_some()
    }

    /// Whether no metric at all could be collected
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
