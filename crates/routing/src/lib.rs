//! Flow definitions, the ordered flow registry, and keyword routing.
//!
//! Routing precedence for an idle conversation:
//! 1. Keyword flows, in registration order (whole-message, case-insensitive)
//! 2. The single catch-all flow, if one is registered
//! 3. Nothing (silent)
//!
//! Continuation routing (a pending flag in the session) takes priority over
//! all of the above and is handled by the dispatcher.

pub mod error;
pub mod flow;
pub mod matcher;
pub mod registry;

pub use {
    error::{Error, RegistryConfigError, Result},
    flow::{Action, Flow, FlowDefinition, FlowSet, Predicate},
    matcher::{MatchReason, RouteMatch, match_flow, normalize},
    registry::{DEFAULT_PENDING_KEY, FlowRegistry, MAX_BRANCH_DEPTH},
};
