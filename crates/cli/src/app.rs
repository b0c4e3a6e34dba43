//! Wiring shared by the subcommands.

use std::{path::Path, sync::Arc};

use {
    anyhow::Context,
    keyflow_config::{KeyflowConfig, MetricsConfig, SessionBackend},
    keyflow_metrics::MetricsHandle,
    keyflow_routing::FlowRegistry,
    keyflow_sessions::{MemorySessionStore, SessionStore, SqliteSessionStore},
    tracing::{debug, info},
};

/// Explicit path when given, discovery otherwise. Either way a file that
/// exists but does not parse stops startup.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<KeyflowConfig> {
    match path {
        Some(path) => keyflow_config::load_config(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => keyflow_config::discover_and_load(),
    }
}

/// Validated flows from `override_path`, the configured path, or the demo.
pub fn load_registry(
    config: &KeyflowConfig,
    override_path: Option<&Path>,
) -> anyhow::Result<FlowRegistry> {
    let path = override_path.or(config.flows.path.as_deref());
    keyflow_config::load_registry(path, &config.dispatch.pending_key).with_context(|| {
        match path {
            Some(p) => format!("loading flows from {}", p.display()),
            None => "loading demo flows".to_string(),
        }
    })
}

pub async fn open_store(config: &KeyflowConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match config.sessions.backend {
        SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
        SessionBackend::Sqlite => Arc::new(
            SqliteSessionStore::connect(&config.sessions.sqlite_url)
                .await
                .with_context(|| format!("opening {}", config.sessions.sqlite_url))?,
        ),
    };
    debug!(backend = store.backend(), "session store ready");
    Ok(store)
}

/// Install the metrics recorder when enabled.
pub fn init_metrics(config: &MetricsConfig) -> anyhow::Result<Option<MetricsHandle>> {
    if !config.enabled {
        debug!("metrics disabled");
        return Ok(None);
    }
    keyflow_metrics::init_metrics()
        .context("installing metrics recorder")
        .map(Some)
}

/// Write the current metrics to the configured snapshot path, if any.
pub fn write_metrics_snapshot(
    config: &MetricsConfig,
    handle: Option<&MetricsHandle>,
) -> anyhow::Result<()> {
    let (Some(path), Some(handle)) = (config.snapshot_path.as_deref(), handle) else {
        return Ok(());
    };
    std::fs::write(path, handle.render())
        .with_context(|| format!("writing metrics snapshot to {}", path.display()))?;
    info!(path = %path.display(), "metrics snapshot written");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyflow.toml");
        std::fs::write(&path, "[dispatch]\npending_key = 42\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("loading config from"));
    }

    #[test]
    fn disabled_metrics_install_nothing() {
        let config = MetricsConfig {
            enabled: false,
            snapshot_path: None,
        };
        assert!(init_metrics(&config).unwrap().is_none());
    }

    #[test]
    fn no_snapshot_without_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");
        let config = MetricsConfig {
            enabled: false,
            snapshot_path: Some(path.clone()),
        };
        write_metrics_snapshot(&config, None).unwrap();
        assert!(!path.exists());
    }

    // The only test in this binary that installs the global recorder.
    #[test]
    fn snapshot_written_after_install() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");
        let config = MetricsConfig {
            enabled: true,
            snapshot_path: Some(path.clone()),
        };
        let handle = init_metrics(&config).unwrap();
        assert!(handle.is_some());
        write_metrics_snapshot(&config, handle.as_ref()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn falls_back_to_demo_flows() {
        let registry = load_registry(&KeyflowConfig::default(), None).unwrap();
        assert!(registry.get("welcome").is_some());
    }

    #[test]
    fn override_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        std::fs::write(&path, "[[flows]]\nid = \"only\"\nkeywords = [\"x\"]\n").unwrap();
        let mut config = KeyflowConfig::default();
        config.flows.path = Some(dir.path().join("missing.toml"));
        let registry = load_registry(&config, Some(&path)).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_flow_file_has_context() {
        let mut config = KeyflowConfig::default();
        config.flows.path = Some("/nonexistent/flows.toml".into());
        let err = load_registry(&config, None).unwrap_err();
        assert!(format!("{err:#}").contains("loading flows from /nonexistent/flows.toml"));
    }

    #[tokio::test]
    async fn opens_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = KeyflowConfig::default();
        config.sessions.backend = SessionBackend::Sqlite;
        config.sessions.sqlite_url = format!("sqlite://{}", dir.path().join("s.db").display());
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.backend(), "sqlite");
    }
}
