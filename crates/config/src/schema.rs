//! Config schema.

use std::path::PathBuf;

use {
    keyflow_routing::DEFAULT_PENDING_KEY,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyflowConfig {
    pub dispatch: DispatchConfig,
    pub sessions: SessionsConfig,
    pub flows: FlowsConfig,
    pub metrics: MetricsConfig,
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Session key whose value names the continuation flow.
    pub pending_key: String,
    /// Evict sessions idle for longer than this. Unset disables eviction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_idle_timeout_secs: Option<u64>,
    /// How often the idle sweeper runs.
    pub sweep_interval_secs: u64,
    /// Inbound queue capacity for the console transport.
    pub inbound_queue: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pending_key: DEFAULT_PENDING_KEY.into(),
            session_idle_timeout_secs: None,
            sweep_interval_secs: 60,
            inbound_queue: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Session storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub backend: SessionBackend,
    /// Used when `backend = "sqlite"`.
    pub sqlite_url: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Memory,
            sqlite_url: "sqlite://keyflow.db".into(),
        }
    }
}

/// Where flows come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowsConfig {
    /// Flow file (TOML, YAML or JSON). The bundled demo flows when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Metrics export for `keyflow run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder at startup.
    pub enabled: bool,
    /// Write the Prometheus text rendering here on shutdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_path: None,
        }
    }
}
