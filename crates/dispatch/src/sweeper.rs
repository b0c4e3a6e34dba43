//! Optional idle-session eviction.

use std::{sync::Arc, time::Duration};

use {
    keyflow_sessions::{SessionStore, cutoff_before},
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{dispatcher::Dispatcher, locks::ConversationLocks};

/// Evicts sessions whose last mutation is older than `idle`.
///
/// Disabled unless the application opts in; a session pending a continuation
/// that goes idle is dropped like any other.
///
/// With [`with_locks`](Self::with_locks) each conversation is evicted under
/// its dispatch lock, and conversations mid-dispatch are left for the next
/// pass. Without locks the store evicts in bulk, which suits offline
/// maintenance where nothing is dispatching in this process.
pub struct IdleSweeper {
    store: Arc<dyn SessionStore>,
    idle: Duration,
    locks: Option<ConversationLocks>,
}

impl IdleSweeper {
    pub fn new(store: Arc<dyn SessionStore>, idle: Duration) -> Self {
        Self {
            store,
            idle,
            locks: None,
        }
    }

    #[must_use]
    pub fn with_locks(mut self, locks: ConversationLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Run one eviction pass. Store errors are logged and count as zero.
    pub async fn sweep_once(&self) -> u64 {
        let idle_ms = i64::try_from(self.idle.as_millis()).unwrap_or(i64::MAX);
        let cutoff = cutoff_before(idle_ms);
        let result = match &self.locks {
            Some(locks) => self.evict_under_locks(locks, cutoff).await,
            None => self.store.evict_idle(cutoff).await,
        };
        match result {
            Ok(0) => {
                debug!(backend = self.store.backend(), "no idle sessions");
                0
            },
            Ok(evicted) => {
                info!(
                    backend = self.store.backend(),
                    evicted,
                    idle_secs = self.idle.as_secs(),
                    "evicted idle sessions"
                );
                evicted
            },
            Err(e) => {
                warn!(backend = self.store.backend(), error = %e, "idle session sweep failed");
                0
            },
        }
    }

    async fn evict_under_locks(
        &self,
        locks: &ConversationLocks,
        cutoff_ms: i64,
    ) -> keyflow_sessions::Result<u64> {
        let mut evicted = 0;
        for id in self.store.idle_conversations(cutoff_ms).await? {
            let Some(_guard) = locks.try_acquire(&id) else {
                debug!(conversation_id = %id, "conversation busy, eviction deferred");
                continue;
            };
            // Re-checked under the lock: a dispatch may have finished since
            // the listing.
            if self.store.evict_if_idle(&id, cutoff_ms).await? {
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    /// Sweep every `every` until `cancel` fires.
    pub async fn run(self, every: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("idle sweeper stopped");
                    return;
                },
                _ = ticker.tick() => {
                    self.sweep_once().await;
                },
            }
        }
    }
}

/// Spawn an [`IdleSweeper`] over `dispatcher`'s store and locks on the
/// current runtime.
pub fn spawn_idle_sweeper(
    dispatcher: &Dispatcher,
    idle: Duration,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    info!(
        idle_secs = idle.as_secs(),
        every_secs = every.as_secs(),
        "idle session eviction enabled"
    );
    let sweeper = IdleSweeper::new(Arc::clone(dispatcher.sessions()), idle)
        .with_locks(dispatcher.locks().clone());
    tokio::spawn(sweeper.run(every, cancel))
}
