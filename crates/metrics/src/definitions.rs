//! Metric name and label definitions.
//!
//! This module defines all metric names and common label keys used throughout keyflow.

/// Dispatcher metrics
pub mod dispatch {
    /// Total number of inbound messages dispatched
    pub const MESSAGES_RECEIVED_TOTAL: &str = "keyflow_dispatch_messages_received_total";
    /// Routing decisions, labeled by route kind
    pub const ROUTES_TOTAL: &str = "keyflow_dispatch_routes_total";
    /// Flows aborted by an action failure
    pub const FLOW_FAILURES_TOTAL: &str = "keyflow_dispatch_flow_failures_total";
    /// Outbound messages handed to the transport
    pub const MESSAGES_SENT_TOTAL: &str = "keyflow_dispatch_messages_sent_total";
    /// Session reads that failed and fell back to idle routing
    pub const SESSION_FALLBACKS_TOTAL: &str = "keyflow_dispatch_session_fallbacks_total";
    /// End-to-end dispatch duration in seconds, lock wait included
    pub const DURATION_SECONDS: &str = "keyflow_dispatch_duration_seconds";
}

/// Session store metrics
pub mod session {
    /// Sessions created by a first write (in-memory backend; SQLite upserts
    /// do not report whether the row was new)
    pub const CREATED_TOTAL: &str = "keyflow_sessions_created_total";
    /// Sessions deleted by a clear action
    pub const CLEARED_TOTAL: &str = "keyflow_sessions_cleared_total";
    /// Sessions removed by idle eviction
    pub const EVICTED_TOTAL: &str = "keyflow_sessions_evicted_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const ROUTE: &str = "route";
    pub const FLOW: &str = "flow";
    pub const BACKEND: &str = "backend";
    pub const ERROR_TYPE: &str = "error_type";
}

/// Histogram buckets
pub mod buckets {
    /// Dispatch durations: lock wait plus outbound sends, so mostly
    /// milliseconds with a tail for slow transports.
    pub const DURATION_SECONDS: &[f64] = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];
}
