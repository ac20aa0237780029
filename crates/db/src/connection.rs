//! SQLite pool construction.
//!
//! Every connection enforces foreign keys (the clinic/review/score tables
//! lean on cascading deletes) and runs in WAL mode so recommendation reads
//! are not blocked by score upserts.

use std::time::Duration;

use denty_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Writers wait for a locked database at most this long, whatever the
/// configured acquire timeout says.
const MAX_BUSY_TIMEOUT_MS: u64 = 30_000;

/// Open a pool from the resolved application config.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let busy_timeout_ms = (timeout_secs.max(1) * 1000).min(MAX_BUSY_TIMEOUT_MS);
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
