//! Postgres connectivity diagnostic.
//!
//! Standalone check used by `licitai db-check`; nothing in the session flows
//! depends on a database.

use sqlx::postgres::PgPoolOptions;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

fn parse_max_connections(raw: Option<String>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
}

fn db_max_connections() -> u32 {
    parse_max_connections(std::env::var("DB_MAX_CONNECTIONS").ok())
}

/// Connect with a bounded pool and return the server's `version()` string.
///
/// # Errors
///
/// Returns an error if the connection or the query fails.
pub async fn check_connection(database_url: &str) -> Result<String, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(db_max_connections())
        .connect(database_url)
        .await?;

    let (version,): (String,) = sqlx::query_as("SELECT version()")
        .fetch_one(&pool)
        .await?;
    pool.close().await;

    tracing::info!(%version, "database reachable");
    Ok(version)
}

#[cfg(test)]
#[path = "db_test.rs"]
mod tests;
