/// Redis relay for multi-instance fan-out
///
/// With more than one API instance a member's sockets may live anywhere.
/// The relay publishes each per-user event to `realtime:user:{user_id}`;
/// every instance runs [`RedisRelay::run_subscriber`], which
/// pattern-subscribes `realtime:user:*` and forwards frames into its own
/// [`SessionRegistry`].
///
/// The payload is the event JSON exactly as sessions receive it, so the
/// subscriber forwards it without re-encoding.
///
/// # Example
///
/// ```no_run
/// use hearth_shared::realtime::{RedisRelay, SessionRegistry};
/// use hearth_shared::redis::{RedisClient, RedisConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> anyhow::Result<()> {
/// let redis = RedisClient::new(RedisConfig::from_url("redis://localhost:6379")).await?;
/// let relay = RedisRelay::new(redis, SessionRegistry::default());
///
/// let shutdown = CancellationToken::new();
/// tokio::spawn(relay.clone().run_subscriber(shutdown.clone()));
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::broadcaster::RealtimeTransport;
use super::event::RealtimeEvent;
use super::registry::SessionRegistry;
use super::RealtimeError;
use crate::redis::RedisClient;

/// Channel prefix; the user id follows
pub const CHANNEL_PREFIX: &str = "realtime:user:";

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Channel carrying events for one user
pub fn user_channel(user_id: Uuid) -> String {
    format!("{CHANNEL_PREFIX}{user_id}")
}

/// Recovers the user id from a channel name
pub fn parse_user_channel(channel: &str) -> Option<Uuid> {
    channel
        .strip_prefix(CHANNEL_PREFIX)
        .and_then(|id| Uuid::parse_str(id).ok())
}

#[derive(Clone)]
pub struct RedisRelay {
    redis: RedisClient,
    registry: SessionRegistry,
}

impl RedisRelay {
    pub fn new(redis: RedisClient, registry: SessionRegistry) -> Self {
        Self { redis, registry }
    }

    /// Forwards relayed events into the local registry until `shutdown`
    ///
    /// Re-subscribes after a short delay when the pub/sub connection drops.
    pub async fn run_subscriber(self, shutdown: CancellationToken) {
        loop {
            match self.subscribe_once(&shutdown).await {
                Ok(()) if shutdown.is_cancelled() => break,
                Ok(()) => warn!("Realtime relay stream ended, resubscribing"),
                Err(e) => error!(error = %e, "Realtime relay subscriber failed, resubscribing"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
            }
        }

        debug!("Realtime relay subscriber stopped");
    }

    async fn subscribe_once(&self, shutdown: &CancellationToken) -> Result<(), RealtimeError> {
        let mut pubsub = self.redis.pubsub().await?;
        let pattern = format!("{CHANNEL_PREFIX}*");
        pubsub.psubscribe(&pattern).await?;

        info!(pattern = %pattern, "Realtime relay subscribed");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        return Ok(());
                    };

                    let Some(user_id) = parse_user_channel(msg.get_channel_name()) else {
                        warn!(channel = %msg.get_channel_name(), "Ignoring message on unexpected channel");
                        continue;
                    };

                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(error = %e, "Failed to read relayed payload");
                            continue;
                        }
                    };

                    self.registry.deliver_payload(user_id, Arc::from(payload));
                }
            }
        }
    }
}

#[async_trait]
impl RealtimeTransport for RedisRelay {
    async fn deliver(&self, user_id: Uuid, event: &RealtimeEvent) -> Result<usize, RealtimeError> {
        let payload = event.to_json()?;
        let mut conn = self.redis.get_connection();

        let receivers: usize = conn.publish(user_channel(user_id), payload).await?;

        Ok(receivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_roundtrip() {
        let user_id = Uuid::new_v4();
        let channel = user_channel(user_id);

        assert!(channel.starts_with("realtime:user:"));
        assert_eq!(parse_user_channel(&channel), Some(user_id));
    }

    #[test]
    fn test_parse_rejects_foreign_channels() {
        assert_eq!(parse_user_channel("ctrl:abc"), None);
        assert_eq!(parse_user_channel("realtime:user:not-a-uuid"), None);
    }
}
