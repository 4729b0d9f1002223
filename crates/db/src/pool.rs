//! SQLite connection pool.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::DbError;

/// Type alias for the shared SQLite pool used across the whole application.
pub type DbPool = SqlitePool;

/// Create a new connection pool from the given `database_url`
/// (e.g. `sqlite://workflow.db?mode=rwc` or `sqlite::memory:`).
///
/// `max_connections` controls the pool ceiling. Connections are never
/// recycled, so an in-memory database lives as long as the pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!("Connecting to database (max_connections={})", max_connections);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run embedded SQLx migrations located in `./migrations` (relative to the
/// workspace root at build time).
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("Running database migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
