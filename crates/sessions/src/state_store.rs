//! SQLite-backed session store.
//!
//! One row per `(conversation_id, key)`. A session exists while it has at
//! least one row; its `updated_at` is the newest row timestamp.
//!
//! Every write is a single statement so pooled connections never hold a
//! read lock they later need to upgrade.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use {
    async_trait::async_trait,
    keyflow_common::ConversationId,
    sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    tracing::debug,
};

#[cfg(feature = "metrics")]
use keyflow_metrics::{counter, labels, session as session_metrics};

use crate::{
    Result,
    error::Context,
    session::{Session, now_ms},
    store::SessionStore,
};

/// How long a writer waits for another connection's write to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(sqlx::FromRow)]
struct StateRow {
    key: String,
    value: String,
    updated_at: i64,
}

/// SQLite-backed session store.
pub struct SqliteSessionStore {
    pool: sqlx::SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options: SqliteConnectOptions = url
            .parse()
            .with_context(|| format!("invalid session database url '{url}'"))?;
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open session database '{url}'"))?;
        crate::run_migrations(&pool).await?;
        debug!(url, "session database ready");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, id: &ConversationId) -> Result<Option<Session>> {
        let rows = sqlx::query_as::<_, StateRow>(
            "SELECT key, value, updated_at FROM session_state WHERE conversation_id = ? ORDER BY key",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let updated_at = rows.iter().map(|r| r.updated_at).max().unwrap_or_default();
        let state: BTreeMap<String, String> = rows.into_iter().map(|r| (r.key, r.value)).collect();
        Ok(Some(Session {
            conversation_id: id.clone(),
            state,
            updated_at,
        }))
    }

    async fn set(&self, id: &ConversationId, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO session_state (conversation_id, key, value, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(conversation_id, key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at"#,
        )
        .bind(id.as_str())
        .bind(key)
        .bind(value)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self, id: &ConversationId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM session_state WHERE conversation_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected() > 0;
        #[cfg(feature = "metrics")]
        if removed {
            counter!(session_metrics::CLEARED_TOTAL, labels::BACKEND => "sqlite").increment(1);
        }
        Ok(removed)
    }

    async fn has(&self, id: &ConversationId) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM session_state WHERE conversation_id = ?)",
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn evict_idle(&self, cutoff_ms: i64) -> Result<u64> {
        let removed: Vec<String> = sqlx::query_scalar(
            r#"DELETE FROM session_state WHERE conversation_id IN (
                 SELECT conversation_id FROM session_state
                 GROUP BY conversation_id HAVING MAX(updated_at) < ?
               )
               RETURNING conversation_id"#,
        )
        .bind(cutoff_ms)
        .fetch_all(&self.pool)
        .await?;

        // One returned row per deleted key; count conversations.
        let evicted = removed.iter().collect::<BTreeSet<_>>().len() as u64;
        #[cfg(feature = "metrics")]
        counter!(session_metrics::EVICTED_TOTAL, labels::BACKEND => "sqlite").increment(evicted);
        Ok(evicted)
    }

    async fn idle_conversations(&self, cutoff_ms: i64) -> Result<Vec<ConversationId>> {
        let raw: Vec<String> = sqlx::query_scalar(
            r#"SELECT conversation_id FROM session_state
               GROUP BY conversation_id HAVING MAX(updated_at) < ?
               ORDER BY conversation_id"#,
        )
        .bind(cutoff_ms)
        .fetch_all(&self.pool)
        .await?;
        // Rows are only ever written through a parsed id.
        Ok(raw
            .iter()
            .filter_map(|id| ConversationId::parse(id).ok())
            .collect())
    }

    async fn evict_if_idle(&self, id: &ConversationId, cutoff_ms: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"DELETE FROM session_state WHERE conversation_id = ?1
               AND (SELECT MAX(updated_at) FROM session_state WHERE conversation_id = ?1) < ?2"#,
        )
        .bind(id.as_str())
        .bind(cutoff_ms)
        .execute(&self.pool)
        .await?;
        let evicted = result.rows_affected() > 0;
        #[cfg(feature = "metrics")]
        if evicted {
            counter!(session_metrics::EVICTED_TOTAL, labels::BACKEND => "sqlite").increment(1);
        }
        Ok(evicted)
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT conversation_id) FROM session_state")
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }
}
