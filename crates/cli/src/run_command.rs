//! Console transport: stdin lines in, stdout lines out.

use std::{path::Path, sync::Arc, time::Duration};

use {
    anyhow::Context,
    keyflow_channels::ConsoleOutbound,
    keyflow_common::{ConversationId, InboundMessage},
    keyflow_config::KeyflowConfig,
    keyflow_dispatch::{Dispatcher, serve, spawn_idle_sweeper},
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        sync::mpsc,
    },
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::app;

/// Conversation used for lines without a `<conversation>:` prefix.
const CONSOLE_CONVERSATION: &str = "console";

pub async fn run(config: &KeyflowConfig, flows: Option<&Path>) -> anyhow::Result<()> {
    let registry = Arc::new(app::load_registry(config, flows)?);
    let metrics = app::init_metrics(&config.metrics)?;
    let store = app::open_store(config).await?;
    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        Arc::clone(&store),
        Arc::new(ConsoleOutbound::stdout()),
    ));

    let cancel = CancellationToken::new();
    let sweeper = config.dispatch.session_idle_timeout_secs.map(|idle| {
        spawn_idle_sweeper(
            &dispatcher,
            Duration::from_secs(idle),
            Duration::from_secs(config.dispatch.sweep_interval_secs.max(1)),
            cancel.clone(),
        )
    });

    let (tx, rx) = mpsc::channel(config.dispatch.inbound_queue.max(1));
    let pump = tokio::spawn(serve(dispatcher, rx, cancel.clone()));

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            ctrl_c.cancel();
        }
    });

    info!(
        backend = store.backend(),
        "reading messages from stdin (`<conversation>: <text>`)"
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line.context("reading stdin")?,
        };
        let Some(line) = line else {
            break;
        };
        match parse_line(&line) {
            Ok(Some(inbound)) => {
                if tx.send(inbound).await.is_err() {
                    break;
                }
            },
            Ok(None) => {},
            Err(e) => warn!(error = %e, "ignoring input line"),
        }
    }

    // Closing the channel lets the pump drain what was already queued.
    drop(tx);
    let dispatched = pump.await.context("dispatch loop panicked")?;
    cancel.cancel();
    if let Some(sweeper) = sweeper {
        sweeper.await.context("idle sweeper panicked")?;
    }
    info!(dispatched, "console transport stopped");
    app::write_metrics_snapshot(&config.metrics, metrics.as_ref())
}

/// Parse one console line. Blank lines yield `None`.
fn parse_line(line: &str) -> anyhow::Result<Option<InboundMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (conversation, text) = match line.split_once(':') {
        Some((prefix, text)) if is_conversation_prefix(prefix) => (prefix, text.trim_start()),
        _ => (CONSOLE_CONVERSATION, line),
    };
    Ok(Some(InboundMessage::new(
        ConversationId::parse(conversation)?,
        text,
    )))
}

/// A prefix names a conversation when it is a single non-empty token.
fn is_conversation_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && !prefix.chars().any(char::is_whitespace)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> (String, String) {
        let msg = parse_line(line).unwrap().unwrap();
        (msg.conversation_id.to_string(), msg.text)
    }

    #[test]
    fn prefixed_line() {
        assert_eq!(parsed("alice: hola"), ("alice".into(), "hola".into()));
        assert_eq!(
            parsed("51999888777@s.whatsapp.net:1"),
            ("51999888777@s.whatsapp.net".into(), "1".into())
        );
    }

    #[test]
    fn plain_line_goes_to_console() {
        assert_eq!(parsed("HOLA"), ("console".into(), "HOLA".into()));
        // A colon after a space is part of the text.
        assert_eq!(
            parsed("la hora es: 12:30"),
            ("console".into(), "la hora es: 12:30".into())
        );
    }

    #[test]
    fn blank_line_is_skipped() {
        assert!(parse_line("   ").unwrap().is_none());
    }

    #[test]
    fn empty_text_after_prefix_is_kept() {
        assert_eq!(parsed("bob:"), ("bob".into(), String::new()));
    }
}
