use std::time::Duration;

use {
    clap::Subcommand,
    keyflow_common::ConversationId,
    keyflow_config::KeyflowConfig,
    keyflow_dispatch::IdleSweeper,
};

use crate::app;

#[derive(Subcommand)]
pub enum SessionsAction {
    /// Print one conversation's session as JSON.
    Show { conversation: String },
    /// Delete one conversation's session.
    Clear { conversation: String },
    /// Number of stored sessions.
    Count,
    /// Evict sessions idle for longer than the given number of seconds.
    Evict {
        #[arg(long)]
        idle_secs: u64,
    },
}

/// Only meaningful with a persistent backend; the memory store starts empty.
pub async fn handle_sessions(action: SessionsAction, config: &KeyflowConfig) -> anyhow::Result<()> {
    let store = app::open_store(config).await?;
    match action {
        SessionsAction::Show { conversation } => {
            let id = ConversationId::parse(&conversation)?;
            match store.get(&id).await? {
                Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
                None => println!("No session for '{id}'."),
            }
        },
        SessionsAction::Clear { conversation } => {
            let id = ConversationId::parse(&conversation)?;
            if store.clear(&id).await? {
                println!("Cleared session for '{id}'.");
            } else {
                println!("No session for '{id}'.");
            }
        },
        SessionsAction::Count => println!("{}", store.len().await?),
        SessionsAction::Evict { idle_secs } => {
            let evicted = IdleSweeper::new(store, Duration::from_secs(idle_secs))
                .sweep_once()
                .await;
            println!("Evicted {evicted} session(s).");
        },
    }
    Ok(())
}
