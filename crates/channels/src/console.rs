use {
    anyhow::Result,
    async_trait::async_trait,
    keyflow_common::OutboundMessage,
    tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        sync::Mutex,
    },
};

use crate::{Error, outbound::ChannelOutbound};

/// Writes outbound messages as text lines, one block per message.
///
/// ```text
/// [alice] Bienvenido
/// [alice]   media: https://example.com/logo.png
/// ```
pub struct ConsoleOutbound<W = tokio::io::Stdout> {
    writer: Mutex<W>,
}

impl ConsoleOutbound {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Send + Unpin> ConsoleOutbound<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

fn render(message: &OutboundMessage) -> String {
    let id = &message.conversation_id;
    let mut out = String::new();
    for line in message.body.lines() {
        out.push_str(&format!("[{id}] {line}\n"));
    }
    if message.body.is_empty() {
        out.push_str(&format!("[{id}]\n"));
    }
    if let Some(media) = &message.media {
        out.push_str(&format!("[{id}]   media: {media}\n"));
    }
    out
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> ChannelOutbound for ConsoleOutbound<W> {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let rendered = render(message);
        let mut writer = self.writer.lock().await;
        writer
            .write_all(rendered.as_bytes())
            .await
            .map_err(|e| Error::external("write console output", e))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::external("flush console output", e))?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, keyflow_common::ConversationId};

    #[tokio::test]
    async fn renders_body_lines_and_media() {
        let console = ConsoleOutbound::new(Vec::new());
        let id = ConversationId::parse("alice").unwrap();
        console
            .send(
                &OutboundMessage::text(id.clone(), "Bienvenido\nMenu")
                    .with_media(Some("https://example.com/logo.png".into())),
            )
            .await
            .unwrap();
        console
            .send(&OutboundMessage::text(id, ""))
            .await
            .unwrap();

        let out = String::from_utf8(console.into_inner()).unwrap();
        assert_eq!(
            out,
            "[alice] Bienvenido\n[alice] Menu\n[alice]   media: https://example.com/logo.png\n[alice]\n"
        );
    }
}
