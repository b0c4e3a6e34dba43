//! Per-conversation mutual exclusion.

use std::sync::Arc;

use {
    dashmap::DashMap,
    keyflow_common::ConversationId,
    tokio::sync::{Mutex, OwnedMutexGuard},
};

type LockMap = DashMap<ConversationId, Arc<Mutex<()>>>;

/// One async mutex per active conversation.
///
/// Entries exist only while a dispatch holds or waits on them. `tokio`'s
/// mutex queues waiters fairly, so dispatches for one conversation run in
/// the order they asked for the lock.
#[derive(Default, Clone)]
pub struct ConversationLocks {
    inner: Arc<LockMap>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: &ConversationId) -> ConversationGuard {
        // Clone the Arc out so the shard lock is released before awaiting.
        let mutex = Arc::clone(self.inner.entry(id.clone()).or_default().value());
        let guard = Arc::clone(&mutex).lock_owned().await;
        ConversationGuard {
            guard: Some(guard),
            mutex,
            id: id.clone(),
            map: Arc::clone(&self.inner),
        }
    }

    /// The lock for `id` if nobody holds it right now.
    pub fn try_acquire(&self, id: &ConversationId) -> Option<ConversationGuard> {
        let mutex = Arc::clone(self.inner.entry(id.clone()).or_default().value());
        match Arc::clone(&mutex).try_lock_owned() {
            Ok(guard) => Some(ConversationGuard {
                guard: Some(guard),
                mutex,
                id: id.clone(),
                map: Arc::clone(&self.inner),
            }),
            Err(_) => {
                drop(mutex);
                // The holder may have released in between and skipped removal
                // because of our clone.
                self.inner.remove_if(id, |_, m| Arc::strong_count(m) == 1);
                None
            },
        }
    }

    /// Conversations currently holding or waiting on a lock.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Held for the duration of one dispatch.
pub struct ConversationGuard {
    guard: Option<OwnedMutexGuard<()>>,
    mutex: Arc<Mutex<()>>,
    id: ConversationId,
    map: Arc<LockMap>,
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Two references left (the map's and ours) means nobody else holds
        // or waits on this mutex. The shard lock taken by `remove_if` keeps
        // new acquirers out while we check.
        self.map.remove_if(&self.id, |_, m| {
            Arc::ptr_eq(m, &self.mutex) && Arc::strong_count(m) == 2
        });
    }
}
