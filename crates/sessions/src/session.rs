use std::{
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

use {keyflow_common::ConversationId, serde::Serialize};

/// Ephemeral state for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub conversation_id: ConversationId,
    pub state: BTreeMap<String, String>,
    /// Unix milliseconds of the last mutation.
    pub updated_at: i64,
}

impl Session {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            state: BTreeMap::new(),
            updated_at: now_ms(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.state.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.state.insert(key.into(), value.into());
        self.updated_at = now_ms();
    }
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Eviction cutoff for sessions idle longer than `idle_ms`.
pub fn cutoff_before(idle_ms: i64) -> i64 {
    now_ms().saturating_sub(idle_ms)
}
