//! Per-conversation session state.
//!
//! A session is a small string map owned by one conversation. It is created
//! lazily by the first write and removed by an explicit clear (or by idle
//! eviction when the embedding application enables it).

pub mod error;
pub mod memory;
pub mod session;
pub mod state_store;
pub mod store;

pub use {
    error::{Error, Result, SessionStoreError},
    memory::MemorySessionStore,
    session::{Session, cutoff_before, now_ms},
    state_store::SqliteSessionStore,
    store::SessionStore,
};

/// Run database migrations for the sessions crate.
///
/// Creates the `session_state` table used by [`SqliteSessionStore`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
