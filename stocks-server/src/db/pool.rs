//! Database connection pool management
//!
//! Uses sqlx PgPool with explicit connection limits.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Create a PostgreSQL connection pool from discrete parameters.
///
/// # Errors
///
/// Returns an error if the first connection cannot be established.
///
/// # Example
///
/// ```ignore
/// let pool = connect(&DatabaseConfig::from_env()?).await?;
/// ```
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(config.connect_options())
        .await
}

/// Create a pool that opens connections on first use.
///
/// Never fails up front; an unreachable database surfaces on the first query.
pub fn connect_lazy(config: &DatabaseConfig) -> PgPool {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_lazy_with(config.connect_options())
}

/// Create a PostgreSQL connection pool from a connection URL.
pub async fn connect_url(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Liveness check: round trip a trivial query.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
