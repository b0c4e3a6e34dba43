//! Inbound pump: pulls messages off a channel and dispatches them.

use std::{collections::HashMap, sync::Arc};

use {
    keyflow_common::{ConversationId, InboundMessage},
    tokio::{
        sync::{mpsc, oneshot},
        task::JoinSet,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::dispatcher::{DispatchOutcome, Dispatcher};

/// Prune finished chain links once this many conversations are tracked.
const PRUNE_THRESHOLD: usize = 1024;

/// Dispatch every message from `rx` until the channel closes or `cancel`
/// fires, then wait for in-flight dispatches. Returns the number of messages
/// dispatched.
///
/// Each message runs on its own task. Messages for one conversation are
/// chained so they reach the dispatcher in arrival order; different
/// conversations proceed independently.
pub async fn serve(
    dispatcher: Arc<Dispatcher>,
    mut rx: mpsc::Receiver<InboundMessage>,
    cancel: CancellationToken,
) -> usize {
    let mut tails: HashMap<ConversationId, oneshot::Receiver<()>> = HashMap::new();
    let mut tasks = JoinSet::new();
    let mut dispatched = 0usize;

    info!("dispatch loop started");
    loop {
        let inbound = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("dispatch loop cancelled");
                break;
            },
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => {
                    debug!("inbound channel closed");
                    break;
                },
            },
        };

        let (done_tx, done_rx) = oneshot::channel();
        let previous = tails.insert(inbound.conversation_id.clone(), done_rx);
        let dispatcher = Arc::clone(&dispatcher);
        tasks.spawn(async move {
            if let Some(previous) = previous {
                // Err means the previous task is gone, which also unblocks us.
                let _ = previous.await;
            }
            let outcome = dispatcher.dispatch(&inbound).await;
            let _ = done_tx.send(());
            outcome
        });
        dispatched += 1;

        if tails.len() >= PRUNE_THRESHOLD {
            tails.retain(|_, rx| matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
        }
        while let Some(joined) = tasks.try_join_next() {
            log_join(joined);
        }
    }

    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
    info!(dispatched, "dispatch loop stopped");
    dispatched
}

fn log_join(joined: Result<DispatchOutcome, tokio::task::JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "dispatch task failed");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        keyflow_channels::{ChannelOutbound, RecordingOutbound},
        keyflow_routing::{Action, FlowDefinition, FlowRegistry},
        keyflow_sessions::MemorySessionStore,
    };

    fn id(raw: &str) -> ConversationId {
        ConversationId::parse(raw).unwrap()
    }

    /// One keyword flow per number, each echoing its number.
    fn numbered_registry(n: usize) -> Arc<FlowRegistry> {
        let defs = (1..=n)
            .map(|i| FlowDefinition {
                id: format!("f{i}"),
                keywords: vec![i.to_string()],
                continuation: false,
                actions: vec![Action::send(i.to_string())],
            })
            .collect();
        Arc::new(FlowRegistry::from_definitions(defs, "pending_flow").unwrap())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn preserves_per_conversation_order() {
        let out = Arc::new(RecordingOutbound::new());
        let dispatcher = Arc::new(Dispatcher::new(
            numbered_registry(30),
            Arc::new(MemorySessionStore::new()),
            Arc::clone(&out) as Arc<dyn ChannelOutbound>,
        ));
        let (tx, rx) = mpsc::channel(64);
        let pump = tokio::spawn(serve(dispatcher, rx, CancellationToken::new()));

        for i in 1..=30 {
            for conv in ["a", "b", "c"] {
                tx.send(InboundMessage::new(id(conv), i.to_string()))
                    .await
                    .unwrap();
            }
        }
        drop(tx);
        assert_eq!(pump.await.unwrap(), 90);

        let expected: Vec<String> = (1..=30).map(|i| i.to_string()).collect();
        for conv in ["a", "b", "c"] {
            let got: Vec<String> = out.sent_to(&id(conv)).into_iter().map(|m| m.body).collect();
            assert_eq!(got, expected, "order broken for {conv}");
        }
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let dispatcher = Arc::new(Dispatcher::new(
            numbered_registry(1),
            Arc::new(MemorySessionStore::new()),
            Arc::new(RecordingOutbound::new()),
        ));
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(serve(dispatcher, rx, cancel.clone()));
        tx.send(InboundMessage::new(id("a"), "1")).await.unwrap();
        cancel.cancel();
        let dispatched = pump.await.unwrap();
        assert!(dispatched <= 1);
        assert!(tx.is_closed());
    }
}
