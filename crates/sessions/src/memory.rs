//! In-process session store.

use {async_trait::async_trait, dashmap::DashMap, keyflow_common::ConversationId, tracing::debug};

#[cfg(feature = "metrics")]
use keyflow_metrics::{counter, labels, session as session_metrics};

use crate::{
    Result,
    session::Session,
    store::SessionStore,
};

/// Sessions kept in a sharded concurrent map. Conversations hashing to
/// different shards never contend; updates to one entry are atomic.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<ConversationId, Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, id: &ConversationId) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }

    async fn set(&self, id: &ConversationId, key: &str, value: &str) -> Result<()> {
        let mut entry = self.sessions.entry(id.clone()).or_insert_with(|| {
            debug!(conversation_id = %id, "session created");
            #[cfg(feature = "metrics")]
            counter!(session_metrics::CREATED_TOTAL, labels::BACKEND => "memory").increment(1);
            Session::new(id.clone())
        });
        entry.insert(key, value);
        Ok(())
    }

    async fn clear(&self, id: &ConversationId) -> Result<bool> {
        let removed = self.sessions.remove(id).is_some();
        #[cfg(feature = "metrics")]
        if removed {
            counter!(session_metrics::CLEARED_TOTAL, labels::BACKEND => "memory").increment(1);
        }
        Ok(removed)
    }

    async fn has(&self, id: &ConversationId) -> Result<bool> {
        Ok(self.sessions.contains_key(id))
    }

    async fn evict_idle(&self, cutoff_ms: i64) -> Result<u64> {
        let mut evicted = 0u64;
        self.sessions.retain(|_, s| {
            let keep = s.updated_at >= cutoff_ms;
            if !keep {
                evicted += 1;
            }
            keep
        });
        #[cfg(feature = "metrics")]
        counter!(session_metrics::EVICTED_TOTAL, labels::BACKEND => "memory").increment(evicted);
        Ok(evicted)
    }

    async fn idle_conversations(&self, cutoff_ms: i64) -> Result<Vec<ConversationId>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.updated_at < cutoff_ms)
            .map(|s| s.key().clone())
            .collect())
    }

    async fn evict_if_idle(&self, id: &ConversationId, cutoff_ms: i64) -> Result<bool> {
        let evicted = self
            .sessions
            .remove_if(id, |_, s| s.updated_at < cutoff_ms)
            .is_some();
        #[cfg(feature = "metrics")]
        if evicted {
            counter!(session_metrics::EVICTED_TOTAL, labels::BACKEND => "memory").increment(1);
        }
        Ok(evicted)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.sessions.len())
    }
}
