//! Derived metric arithmetic
//!
//! Turns raw chart samples into the usage metrics of a [`HostMetrics`] record.
//! Everything in here is pure: no I/O and no logging.
//!
//! | Metric   | Chart          | Raw vector                          | Formula                        |
//! |----------|----------------|-------------------------------------|--------------------------------|
//! | CPU %    | `system.cpu`   | CPU state percentages               | sum of all values              |
//! | Network  | `system.net`   | `[received, sent]`, sent negative   | `v[0]`, `abs(v[1])`            |
//! | Memory % | `system.ram`   | `[free, used, cached, buffers]`     | `used / sum * 100`             |
//! | Disk %   | `disk_space./` | `[avail, used, reserved_for_root]`  | `sum(v[1..]) / sum(v) * 100`   |

use std::fmt;

use crate::HostMetrics;

/// Charts requested from every host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chart {
    Cpu,
    Network,
    Memory,
    Disk,
}

impl Chart {
    pub const ALL: [Chart; 4] = [Chart::Cpu, Chart::Network, Chart::Memory, Chart::Disk];

    /// Chart name on the telemetry endpoint
    pub fn name(&self) -> &'static str {
        match self {
            Chart::Cpu => "system.cpu",
            Chart::Network => "system.net",
            Chart::Memory => "system.ram",
            Chart::Disk => "disk_space./",
        }
    }
}

impl fmt::Display for Chart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComputationError {
    /// The sample has fewer columns than the formula needs
    TooFewValues { expected: usize, actual: usize },

    /// A percentage denominator summed up to zero
    ZeroTotal,

    /// The result is NaN or infinite
    NonFinite,
}

impl fmt::Display for ComputationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputationError::TooFewValues { expected, actual } => {
                write!(f, "expected at least {} values, got {}", expected, actual)
            }
            ComputationError::ZeroTotal => write!(f, "total is zero"),
            ComputationError::NonFinite => write!(f, "result is not a finite number"),
        }
    }
}

impl std::error::Error for ComputationError {}

pub type ComputationResult<T> = Result<T, ComputationError>;

fn require(sample: &[f64], expected: usize) -> ComputationResult<()> {
    if sample.len() < expected {
        return Err(ComputationError::TooFewValues {
            expected,
            actual: sample.len(),
        });
    }
    Ok(())
}

fn finite(value: f64) -> ComputationResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputationError::NonFinite)
    }
}

fn percentage(part: f64, total: f64) -> ComputationResult<f64> {
    if total == 0.0 {
        return Err(ComputationError::ZeroTotal);
    }
    finite(part / total * 100.0)
}

/// CPU usage: sum of all state percentages
pub fn cpu_usage(sample: &[f64]) -> ComputationResult<f64> {
    require(sample, 1)?;
    finite(sample.iter().sum())
}

/// Network traffic as `(received, sent)` in kbit/s
///
/// The endpoint reports outbound traffic as a negative number.
pub fn network_traffic(sample: &[f64]) -> ComputationResult<(f64, f64)> {
    require(sample, 2)?;
    Ok((finite(sample[0])?, finite(sample[1].abs())?))
}

/// Memory usage: `used / (free + used + cached + buffers) * 100`
pub fn memory_usage(sample: &[f64]) -> ComputationResult<f64> {
    require(sample, 4)?;
    let total: f64 = sample[..4].iter().sum();
    percentage(sample[1], total)
}

/// Disk usage: everything but the available space, relative to the total
pub fn disk_usage(sample: &[f64]) -> ComputationResult<f64> {
    require(sample, 2)?;
    let total: f64 = sample.iter().sum();
    let used_total: f64 = sample[1..].iter().sum();
    percentage(used_total, total)
}

/// Accumulates the metrics of one host as they are derived
///
/// Fields that are never set stay `None`. [`MetricsBuilder::build`] always
/// succeeds, whichever metrics made it.
#[derive(Debug, Clone, Default)]
pub struct MetricsBuilder {
    metrics: HostMetrics,
}

impl MetricsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cpu(mut self, value: Option<f64>) -> Self {
        self.metrics.cpu_usage_pct = value;
        self
    }

    pub fn network(mut self, value: Option<(f64, f64)>) -> Self {
        self.metrics.network_received = value.map(|(received, _)| received);
        self.metrics.network_sent = value.map(|(_, sent)| sent);
        self
    }

    pub fn memory(mut self, value: Option<f64>) -> Self {
        self.metrics.memory_usage_pct = value;
        self
    }

    pub fn disk(mut self, value: Option<f64>) -> Self {
        self.metrics.disk_usage_pct = value;
        self
    }

    pub fn build(self) -> HostMetrics {
        self.metrics
    }
}
