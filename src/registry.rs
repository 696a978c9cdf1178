//! Static registry of monitored hosts
//!
//! The registry is built once at startup from the configuration and never
//! changes afterwards. It is cheap to clone and shared by every cycle.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use reqwest::Url;

/// A monitored host with a telemetry endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// Stable identifier, used as `host_id` of persisted records
    pub id: String,

    /// Base URL of the telemetry endpoint, without trailing slash
    pub endpoint: String,
}

impl Host {
    pub fn new(id: impl Into<String>, endpoint: impl AsRef<str>) -> Result<Self, RegistryError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }

        let endpoint = endpoint.as_ref().trim_end_matches('/');
        let url = Url::parse(endpoint).map_err(|e| RegistryError::InvalidEndpoint {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidEndpoint {
                id,
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        Ok(Self {
            id,
            endpoint: endpoint.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    EmptyId,
    DuplicateId(String),
    InvalidEndpoint { id: String, reason: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::EmptyId => write!(f, "host id must not be empty"),
            RegistryError::DuplicateId(id) => write!(f, "host id '{}' is configured twice", id),
            RegistryError::InvalidEndpoint { id, reason } => {
                write!(f, "invalid endpoint for host '{}': {}", id, reason)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Immutable, ordered list of hosts
#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    hosts: Arc<[Host]>,
}

impl HostRegistry {
    pub fn new(hosts: Vec<Host>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for host in &hosts {
            if !seen.insert(host.id.as_str()) {
                return Err(RegistryError::DuplicateId(host.id.clone()));
            }
        }

        Ok(Self {
            hosts: hosts.into(),
        })
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
