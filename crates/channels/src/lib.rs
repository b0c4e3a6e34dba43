//! Outbound side of the transport seam.
//!
//! The dispatcher only ever calls [`ChannelOutbound::send`]. Real messaging
//! networks (WhatsApp, Telegram, ...) live behind their own adapters; this
//! crate ships a console adapter and a recording adapter.

pub mod console;
pub mod error;
pub mod outbound;
pub mod recording;

pub use {
    console::ConsoleOutbound,
    error::{Error, Result},
    outbound::ChannelOutbound,
    recording::RecordingOutbound,
};
