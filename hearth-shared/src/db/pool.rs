/// Database connection pool management
///
/// One PostgreSQL pool is shared by every handler and background task. It is
/// the only durability boundary: multi-statement mutations (house creation,
/// member removal, invitation accept) open their transactions on it.
///
/// # Example
///
/// ```no_run
/// use hearth_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let pool = create_pool(DatabaseConfig::from_url("postgresql://localhost/hearth")).await?;
/// let houses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM houses").fetch_one(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,

    /// Idle connections kept open
    pub min_connections: u32,

    /// How long a handler waits for a free connection
    pub acquire_timeout: Duration,

    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl DatabaseConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

/// Connects and runs one health check before handing the pool out
///
/// # Errors
///
/// Fails when the URL is invalid or the database does not answer.
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(&config.url)
        .await?;

    health_check(&pool).await?;

    info!(max_connections = config.max_connections, "Database pool ready");
    Ok(pool)
}

/// `SELECT 1`; used at start-up and by `GET /health`
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    if one == 1 {
        Ok(())
    } else {
        Err(sqlx::Error::Protocol(format!("SELECT 1 returned {one}")))
    }
}

pub async fn close_pool(pool: PgPool) {
    info!("Closing database pool");
    pool.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_defaults() {
        let config = DatabaseConfig::from_url("postgresql://localhost/hearth");
        assert_eq!(config.url, "postgresql://localhost/hearth");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(600)));
    }
}
