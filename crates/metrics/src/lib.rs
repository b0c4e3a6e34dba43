//! Metric names, labels and export for keyflow.
//!
//! Crates record through the `metrics` facade behind their own `metrics`
//! feature. Nothing is exported until the embedding application calls
//! [`init_metrics`]; with the `prometheus` feature that installs a
//! Prometheus recorder whose text rendering the caller can snapshot.
//!
//! ```rust,ignore
//! use keyflow_metrics::{counter, dispatch, labels};
//!
//! counter!(dispatch::ROUTES_TOTAL, labels::ROUTE => "keyword").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, init_metrics},
};

#[cfg(feature = "prometheus")]
pub use recorder::build_recorder;

// Re-export metrics macros for convenience
pub use metrics::{counter, histogram};
