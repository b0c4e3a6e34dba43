//! Flow file loading.
//!
//! A flow file is a document with a `flows` array, in TOML, YAML or JSON.
//! Array order is routing priority.

use std::path::Path;

use {
    keyflow_routing::{FlowRegistry, FlowSet},
    tracing::info,
};

use crate::{Error, Result, env_subst::substitute_env};

/// The bundled demo flows.
pub const DEMO_FLOWS: &str = include_str!("../flows/demo.toml");

/// Parse a flow document. `ext` selects the format.
pub fn parse_flow_set(raw: &str, ext: &str, origin: &str) -> Result<FlowSet> {
    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(origin, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(origin, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(origin, e)),
        other => Err(Error::UnsupportedFormat { ext: other.into() }),
    }
}

/// Read a flow file, with `${ENV}` substitution.
pub fn load_flow_set(path: &Path) -> Result<FlowSet> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    parse_flow_set(&substitute_env(&raw), ext, &path.display().to_string())
}

pub fn demo_flow_set() -> Result<FlowSet> {
    parse_flow_set(DEMO_FLOWS, "toml", "<demo>")
}

/// Load flows from `path` (or the demo flows) and validate them.
pub fn load_registry(path: Option<&Path>, pending_key: &str) -> Result<FlowRegistry> {
    let set = match path {
        Some(path) => load_flow_set(path)?,
        None => demo_flow_set()?,
    };
    let registry = FlowRegistry::from_definitions(set.flows, pending_key)?;
    info!(
        source = %path.map_or_else(|| "<demo>".to_string(), |p| p.display().to_string()),
        flows = registry.len(),
        catch_all = registry.catch_all().map(|f| f.id()),
        "flows loaded"
    );
    Ok(registry)
}
