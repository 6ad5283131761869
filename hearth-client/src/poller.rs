/// Fallback polling while realtime is down
///
/// The poller always runs. While the realtime connection reports `true` it
/// waits on the status channel and does nothing. While disconnected it
/// refetches every active query once per `interval`. The timer restarts only
/// when the connection drops, so the first poll after a drop comes one full
/// interval later; the reconnect itself reconciles the cache. Repeated
/// "still down" notifications from a reconnecting listener leave the
/// schedule alone.

use crate::cache::QueryCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default refetch period (5 minutes)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

pub struct FallbackPoller {
    cache: Arc<QueryCache>,
    interval: Duration,
    status: watch::Receiver<bool>,
}

impl FallbackPoller {
    pub fn new(cache: Arc<QueryCache>, interval: Duration, status: watch::Receiver<bool>) -> Self {
        Self {
            cache,
            interval,
            status,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        // A dropped listener counts as disconnected for good
        let mut watching = true;
        let mut connected = *self.status.borrow_and_update();

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if connected {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = self.status.changed() => {
                        if changed.is_err() {
                            watching = false;
                        }
                    }
                }
            } else {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = self.status.changed(), if watching => {
                        if changed.is_err() {
                            watching = false;
                        }
                    }
                    _ = ticker.tick() => {
                        let refetched = self.cache.refetch_active().await;
                        debug!(refetched = refetched.len(), "Fallback poll");
                    }
                }
            }

            let now_connected = watching && *self.status.borrow_and_update();
            if connected && !now_connected {
                ticker.reset();
            }
            connected = now_connected;
        }

        debug!("Fallback poller stopped");
    }
}
