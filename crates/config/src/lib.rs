//! Configuration loading, env substitution, and flow file loading.
//!
//! Config files: `keyflow.toml`, `keyflow.yaml`, `keyflow.yml`, or
//! `keyflow.json`. Searched in `./` then the user config dir
//! (`~/.config/keyflow/` on Linux).
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod flows;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    flows::{DEMO_FLOWS, demo_flow_set, load_flow_set, load_registry, parse_flow_set},
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        DispatchConfig, FlowsConfig, KeyflowConfig, MetricsConfig, SessionBackend, SessionsConfig,
    },
};
