use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::trace;

use crate::registry::{Host, HostRegistry, RegistryError};

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./metrics.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub hosts: Vec<HostConfig>,

    /// Minutes between two collection cycles
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Hard timeout of a single telemetry request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Storage configuration (defaults to SQLite at ./metrics.db)
    #[serde(default)]
    pub storage: StorageConfig,

    pub api: Option<ApiSettings>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct HostConfig {
    pub id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "crate::util::get_default_bind_addr")]
    pub bind: SocketAddr,
    #[serde(default)]
    pub enable_cors: bool,
}

/// One week
const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

fn default_interval_minutes() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    5
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configured hosts and freeze them into a registry
    pub fn resolve_hosts(&self) -> Result<HostRegistry, RegistryError> {
        let hosts = self
            .hosts
            .iter()
            .map(|host| Host::new(&host.id, &host.endpoint))
            .collect::<Result<Vec<_>, _>>()?;

        HostRegistry::new(hosts)
    }

    fn validate(self) -> anyhow::Result<Self> {
        if self.interval_minutes == 0 {
            anyhow::bail!("interval_minutes must be at least 1");
        }
        if self.interval_minutes > MAX_INTERVAL_MINUTES {
            anyhow::bail!("interval_minutes must be at most {MAX_INTERVAL_MINUTES}");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        self.resolve_hosts()?;
        Ok(self)
    }
}

/// Read a configuration file. Files ending in `.toml` are parsed as TOML,
/// everything else as JSON.
pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)?;

    let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&file_content)
            .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?,
        _ => serde_json::from_str(&file_content)
            .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?,
    };

    config
        .validate()
        .inspect(|config| trace!("loaded config: {config:?}"))
}
