use std::sync::Mutex;

use {
    anyhow::Result,
    async_trait::async_trait,
    keyflow_common::{ConversationId, OutboundMessage},
    tracing::debug,
};

use crate::{Error, outbound::ChannelOutbound};

/// Captures outbound messages instead of delivering them.
///
/// Used for dry runs and tests. With [`RecordingOutbound::failing_after`] the
/// adapter accepts `n` messages and rejects every later one, which simulates
/// a transport going away mid-flow.
#[derive(Default)]
pub struct RecordingOutbound {
    /// std Mutex: only held for a push or a clone, never across `.await`.
    sent: Mutex<Vec<OutboundMessage>>,
    fail_after: Option<usize>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(accepted: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_after: Some(accepted),
        }
    }

    /// All accepted messages, in delivery order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Accepted messages for one conversation, in delivery order.
    pub fn sent_to(&self, id: &ConversationId) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|m| &m.conversation_id == id)
            .collect()
    }

    /// Drain accepted messages.
    pub fn take(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .map(|mut v| std::mem::take(&mut *v))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| Error::unavailable("recording outbound poisoned"))?;
        if let Some(limit) = self.fail_after
            && sent.len() >= limit
        {
            return Err(Error::unavailable(format!(
                "transport rejected message after {limit} sends"
            ))
            .into());
        }
        debug!(conversation_id = %message.conversation_id, "recorded outbound message");
        sent.push(message.clone());
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn msg(to: &str, body: &str) -> OutboundMessage {
        OutboundMessage::text(ConversationId::parse(to).unwrap(), body)
    }

    #[tokio::test]
    async fn records_in_order_per_conversation() {
        let rec = RecordingOutbound::new();
        rec.send(&msg("a", "1")).await.unwrap();
        rec.send(&msg("b", "x")).await.unwrap();
        rec.send(&msg("a", "2")).await.unwrap();

        let a = ConversationId::parse("a").unwrap();
        let bodies: Vec<_> = rec.sent_to(&a).into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["1", "2"]);
        assert_eq!(rec.take().len(), 3);
        assert!(rec.sent().is_empty());
    }

    #[tokio::test]
    async fn fails_after_limit() {
        let rec = RecordingOutbound::failing_after(1);
        rec.send(&msg("a", "ok")).await.unwrap();
        let err = rec.send(&msg("a", "lost")).await.unwrap_err();
        assert!(err.to_string().contains("after 1 sends"));
        assert_eq!(rec.sent().len(), 1);
    }
}
