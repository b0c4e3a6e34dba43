use {anyhow::Result, async_trait::async_trait, keyflow_common::OutboundMessage};

/// Send messages to a channel.
///
/// `send` may suspend on network I/O. It returns once the transport has
/// accepted the message (or failed to), so callers can treat each call as an
/// ordering barrier.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}
