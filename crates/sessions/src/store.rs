use {async_trait::async_trait, keyflow_common::ConversationId};

use crate::{Result, session::Session};

/// Storage for per-conversation sessions.
///
/// Each call is atomic for its conversation. Callers that need several calls
/// to behave as one (the dispatcher) serialize per conversation themselves.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short name for logs and metric labels.
    fn backend(&self) -> &'static str;

    async fn get(&self, id: &ConversationId) -> Result<Option<Session>>;

    /// Write one key, creating the session if needed.
    async fn set(&self, id: &ConversationId, key: &str, value: &str) -> Result<()>;

    /// Delete the whole session. Returns whether one existed.
    async fn clear(&self, id: &ConversationId) -> Result<bool>;

    async fn has(&self, id: &ConversationId) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }

    /// Remove sessions whose last mutation is older than `cutoff_ms`
    /// (unix milliseconds). Returns the number removed.
    async fn evict_idle(&self, cutoff_ms: i64) -> Result<u64>;

    /// Conversations whose last mutation is older than `cutoff_ms`.
    async fn idle_conversations(&self, cutoff_ms: i64) -> Result<Vec<ConversationId>>;

    /// Remove one session if it is still older than `cutoff_ms`.
    async fn evict_if_idle(&self, id: &ConversationId, cutoff_ms: i64) -> Result<bool> {
        match self.get(id).await? {
            Some(session) if session.updated_at < cutoff_ms => self.clear(id).await,
            _ => Ok(false),
        }
    }

    /// Number of live sessions.
    async fn len(&self) -> Result<usize>;
}
