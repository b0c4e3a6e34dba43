//! Shared types, error definitions, and utilities used across all keyflow crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{Attachment, ConversationId, InboundMessage, OutboundMessage},
};
