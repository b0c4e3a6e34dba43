use std::{path::Path, sync::Arc};

use {
    clap::Subcommand,
    keyflow_channels::RecordingOutbound,
    keyflow_common::{ConversationId, InboundMessage},
    keyflow_config::KeyflowConfig,
    keyflow_dispatch::Dispatcher,
    keyflow_sessions::MemorySessionStore,
};

use crate::app;

#[derive(Subcommand)]
pub enum FlowsAction {
    /// Validate a flow file (or the configured flows).
    Check {
        path: Option<std::path::PathBuf>,
    },
    /// List flows in routing order.
    List,
}

pub async fn handle_flows(
    action: FlowsAction,
    config: &KeyflowConfig,
    flows: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        FlowsAction::Check { path } => {
            let registry = app::load_registry(config, path.as_deref().or(flows))?;
            println!(
                "OK: {} flows, catch-all: {}",
                registry.len(),
                registry.catch_all().map_or("none", |f| f.id())
            );
        },
        FlowsAction::List => {
            let registry = app::load_registry(config, flows)?;
            for (position, flow) in registry.flows().iter().enumerate() {
                let trigger = if flow.is_continuation() {
                    format!("continuation ({} = {})", registry.pending_key(), flow.id())
                } else if flow.is_catch_all() {
                    "catch-all".to_string()
                } else {
                    flow.keywords().join(", ")
                };
                println!(
                    "{:>3}  {:<20} {:<3} actions  {}",
                    position + 1,
                    flow.id(),
                    flow.actions().len(),
                    trigger
                );
            }
        },
    }
    Ok(())
}

/// Resolve and dry-run `text` against an empty session; nothing is sent.
pub async fn route(
    config: &KeyflowConfig,
    flows: Option<&Path>,
    conversation: &str,
    text: &str,
) -> anyhow::Result<()> {
    let registry = app::load_registry(config, flows)?;
    let outbound = Arc::new(RecordingOutbound::new());
    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        Arc::new(MemorySessionStore::new()),
        outbound.clone(),
    );
    let inbound = InboundMessage::new(ConversationId::parse(conversation)?, text);
    let outcome = dispatcher.dispatch(&inbound).await;
    let state = dispatcher
        .conversation_state(&inbound.conversation_id)
        .await;

    let report = serde_json::json!({
        "route": outcome.route,
        "messages": outbound.take(),
        "state_after": state,
        "error": outcome.error,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
