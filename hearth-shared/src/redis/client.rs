/// Redis connection handle for the realtime relay
///
/// Redis is optional for Hearth. When `REDIS_URL` is set, every server
/// instance publishes realtime events through it and subscribes for the
/// sessions it holds. Two kinds of connection are handed out:
///
/// - a shared, self-reconnecting [`ConnectionManager`] for `PUBLISH` and
///   `PING`
/// - a dedicated [`PubSub`] connection per subscriber loop
///
/// # Example
///
/// ```no_run
/// use hearth_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = RedisClient::new(RedisConfig::from_url("redis://localhost:6379")).await?;
/// client.ping().await?;
/// # Ok(())
/// # }
/// ```
///
/// [`PubSub`]: redis::aio::PubSub

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Invalid Redis URL: {0}")]
    InvalidUrl(String),

    #[error("Redis unavailable: {0}")]
    Unavailable(#[from] RedisError),

    #[error("Redis did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Unexpected PING reply: {0}")]
    UnexpectedReply(String),
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// `redis://[user:pass@]host:port[/db]`
    pub url: String,

    pub command_timeout: Duration,
}

impl RedisConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Cloning shares the managed connection
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    manager: ConnectionManager,
    command_timeout: Duration,
}

impl RedisClient {
    /// Opens the managed connection
    ///
    /// # Errors
    ///
    /// Fails on a malformed URL or when the first connection is refused.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::InvalidUrl(e.to_string()))?;
        let manager = ConnectionManager::new(client.clone()).await?;

        tracing::info!(url = %sanitize_url(&config.url), "Connected to Redis");

        Ok(Self {
            client,
            manager,
            command_timeout: config.command_timeout,
        })
    }

    /// Round-trips a `PING`, bounded by the command timeout
    pub async fn ping(&self) -> Result<(), RedisClientError> {
        let mut conn = self.manager.clone();

        let reply: String = tokio::time::timeout(self.command_timeout, redis::cmd("PING").query_async(&mut conn))
            .await
            .map_err(|_| RedisClientError::Timeout(self.command_timeout))??;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(RedisClientError::UnexpectedReply(reply))
        }
    }

    /// Shared connection for `PUBLISH`
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Dedicated connection for a subscriber loop
    pub async fn pubsub(&self) -> Result<redis::aio::PubSub, RedisClientError> {
        let conn = self.client.get_async_connection().await?;
        Ok(conn.into_pubsub())
    }
}

/// Masks credentials so a Redis URL can be logged
pub fn sanitize_url(url: &str) -> String {
    match (url.split_once("://"), url.rsplit_once('@')) {
        (Some((scheme, _)), Some((_, host))) => format!("{scheme}://***@{host}"),
        _ => url.to_string(),
    }
}
