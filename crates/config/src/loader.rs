use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{env_subst::substitute_env, schema::KeyflowConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "keyflow.toml",
    "keyflow.yaml",
    "keyflow.yml",
    "keyflow.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<KeyflowConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./keyflow.{toml,yaml,yml,json}` (project-local)
/// 2. `<user config dir>/keyflow.{toml,yaml,yml,json}`
///
/// Returns `KeyflowConfig::default()` if no file is found. A file that is
/// found but fails to load is an error.
pub fn discover_and_load() -> anyhow::Result<KeyflowConfig> {
    load_found(find_config_file())
}

fn load_found(found: Option<PathBuf>) -> anyhow::Result<KeyflowConfig> {
    let Some(path) = found else {
        debug!("no config file found, using defaults");
        return Ok(KeyflowConfig::default());
    };
    debug!(path = %path.display(), "loading config");
    load_config(&path).map_err(|e| e.context(format!("invalid config file {}", path.display())))
}

/// First config file in the standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    find_in(Path::new(".")).or_else(|| config_dir().and_then(|dir| find_in(&dir)))
}

/// The user-global config directory (`~/.config/keyflow/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "keyflow").map(|d| d.config_dir().to_path_buf())
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<KeyflowConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
