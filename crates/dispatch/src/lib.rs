//! Inbound message dispatch: the glue between the transport and flows.
//!
//! Flow: inbound message → per-conversation lock → load session → route
//! (continuation, keyword, catch-all, or silent) → execute the flow's actions
//! in order → outbound messages via the channel.

pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod locks;
pub mod serve;
pub mod sweeper;

pub use {
    dispatcher::{ConversationState, DispatchOutcome, Dispatcher, Route},
    error::{ActionExecutionError, Result},
    executor::{ActionExecutor, ExecutionReport},
    locks::{ConversationGuard, ConversationLocks},
    serve::serve,
    sweeper::{IdleSweeper, spawn_idle_sweeper},
};
