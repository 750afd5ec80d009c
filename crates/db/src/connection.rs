use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::debug;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

/// Opens the catalog pool. In-memory databases are per connection, so they
/// are pinned to a single connection to keep migrations and reads together.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let url = normalize_url(database_url);
    let max_connections = if is_in_memory(&url) { 1 } else { max_connections.max(1) };
    debug!(
        event_name = "db.pool.connecting",
        max_connections,
        timeout_secs,
        in_memory = is_in_memory(&url),
        "opening catalog database pool"
    );

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
}

/// Round-trips a trivial statement through the pool.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await.map(|_| ())
}

fn normalize_url(database_url: &str) -> String {
    match database_url.trim() {
        ":memory:" => "sqlite::memory:".to_string(),
        other => other.to_string(),
    }
}

fn is_in_memory(url: &str) -> bool {
    url.starts_with("sqlite::memory:") || url.contains("mode=memory")
}
