/// Realtime listener
///
/// Keeps one WebSocket open to `/v1/realtime` and turns every event into a
/// cache invalidation:
///
/// ```text
/// connect ──> {"type":"auth"} ──> ready ──> invalidate_all ──> events …
///    ▲                                                          │
///    └──────────── backoff (1 s … 60 s) <── closed / error ─────┘
/// ```
///
/// Events missed while disconnected are never replayed, so each successful
/// connect invalidates the whole cache. Connection failures are logged at
/// debug level only; the [`FallbackPoller`] covers the gap.
///
/// The connection state is published on a `watch` channel: `true` between
/// `ready` and the socket closing.
///
/// [`FallbackPoller`]: crate::poller::FallbackPoller

use crate::cache::QueryCache;
use crate::error::ClientError;
use crate::invalidator::invalidation_targets;
use futures::{SinkExt, StreamExt};
use hearth_shared::realtime::{ClientFrame, ControlFrame, RealtimeEvent, ServerFrame};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub struct RealtimeListener {
    url: String,
    token: String,
    cache: Arc<QueryCache>,
    status: watch::Sender<bool>,
}

impl RealtimeListener {
    pub fn new(url: impl Into<String>, token: impl Into<String>, cache: Arc<QueryCache>) -> Self {
        let (status, _) = watch::channel(false);
        Self {
            url: url.into(),
            token: token.into(),
            cache,
            status,
        }
    }

    /// Connection state; `true` while events are flowing
    pub fn status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Notifies watchers only when the state actually flips
    fn set_connected(&self, value: bool) {
        self.status
            .send_if_modified(|connected| std::mem::replace(connected, value) != value);
    }

    /// Connects and reconnects until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        let mut backoff = INITIAL_BACKOFF;

        while !shutdown.is_cancelled() {
            match self.session(&shutdown, &mut backoff).await {
                Ok(()) => debug!("Realtime connection closed"),
                Err(e) => debug!(error = %e, "Realtime connection failed"),
            }
            self.set_connected(false);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        self.set_connected(false);
        debug!("Realtime listener stopped");
    }

    async fn session(&self, shutdown: &CancellationToken, backoff: &mut Duration) -> Result<(), ClientError> {
        let (socket, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        let auth = serde_json::to_string(&ClientFrame::Auth {
            token: self.token.clone(),
        })?;
        sink.send(Message::Text(auth)).await?;

        let viewer = timeout(READY_TIMEOUT, async {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => return ready_user(&text),
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            return Err(ClientError::from(e));
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => return Err(ClientError::from(e)),
                }
            }
            Err(ClientError::Protocol("Socket closed before ready".to_string()))
        })
        .await
        .map_err(|_| ClientError::Protocol("Timed out waiting for ready".to_string()))??;

        self.set_connected(true);
        *backoff = INITIAL_BACKOFF;
        info!(user_id = %viewer, "Realtime connected");

        let refetched = self.cache.invalidate_all().await;
        debug!(refetched = refetched.len(), "Reconciled cache after connect");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text, viewer).await,
                        Some(Ok(Message::Ping(data))) => sink.send(Message::Pong(data)).await?,
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str, viewer: Uuid) {
        match parse_event(text) {
            Some(event) => {
                let keys = invalidation_targets(&event, viewer);
                debug!(
                    event_type = event.event_type.as_str(),
                    house_id = %event.house_id,
                    keys = keys.len(),
                    "Realtime event"
                );
                self.cache.invalidate(&keys).await;
            }
            None => debug!("Ignoring unrecognised realtime frame"),
        }
    }
}

/// The user id from a `ready` frame, or the server's reason for refusing
fn ready_user(text: &str) -> Result<Uuid, ClientError> {
    match serde_json::from_str::<ServerFrame>(text)? {
        ServerFrame::Control(ControlFrame::Ready { user_id }) => Ok(user_id),
        ServerFrame::Control(ControlFrame::Error { message }) => Err(ClientError::Protocol(message)),
        ServerFrame::Event(_) => Err(ClientError::Protocol("Event received before ready".to_string())),
    }
}

fn parse_event(text: &str) -> Option<RealtimeEvent> {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame::Event(event)) => Some(event),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::CountingFetcher;
    use crate::query::QueryKey;
    use hearth_shared::realtime::EventAction;
    use serde_json::json;
    use tokio::net::TcpListener;

    #[test]
    fn test_ready_user() {
        let user_id = Uuid::new_v4();
        let ready = serde_json::to_string(&ControlFrame::Ready { user_id }).unwrap();
        assert_eq!(ready_user(&ready).unwrap(), user_id);

        let refused = serde_json::to_string(&ControlFrame::Error {
            message: "Invalid token".to_string(),
        })
        .unwrap();
        assert_eq!(ready_user(&refused).unwrap_err().to_string(), "Realtime protocol error: Invalid token");
    }

    #[test]
    fn test_parse_event_skips_control_frames() {
        let event = RealtimeEvent::device(EventAction::Updated, Uuid::new_v4(), json!({}));
        assert_eq!(parse_event(&event.to_json().unwrap()), Some(event));

        let ready = serde_json::to_string(&ControlFrame::Ready { user_id: Uuid::new_v4() }).unwrap();
        assert_eq!(parse_event(&ready), None);
        assert_eq!(parse_event("not json"), None);
    }

    #[tokio::test]
    async fn test_events_invalidate_observed_queries() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let house = Uuid::new_v4();
        let viewer = Uuid::new_v4();

        let server = tokio::spawn(async move {
            let (tcp, _) = server.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let Some(Ok(Message::Text(auth))) = ws.next().await else {
                panic!("expected an auth frame");
            };
            assert_eq!(
                serde_json::from_str::<ClientFrame>(&auth).unwrap(),
                ClientFrame::Auth { token: "secret".to_string() }
            );

            let ready = serde_json::to_string(&ControlFrame::Ready { user_id: viewer }).unwrap();
            ws.send(Message::Text(ready)).await.unwrap();

            let event = RealtimeEvent::task(EventAction::Created, house, json!({}));
            ws.send(Message::Text(event.to_json().unwrap())).await.unwrap();

            while let Some(Ok(message)) = ws.next().await {
                if message.is_close() {
                    break;
                }
            }
        });

        let fetcher = Arc::new(CountingFetcher::default());
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::Tasks(house);
        let _watch = cache.observe(key);
        cache.get(key).await.unwrap();

        let listener = RealtimeListener::new(format!("ws://{addr}"), "secret", cache.clone());
        let mut status = listener.status();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(listener.run(shutdown.clone()));

        status.wait_for(|connected| *connected).await.unwrap();

        // initial fetch, reconnect reconciliation, then the task event
        timeout(Duration::from_secs(5), async {
            while fetcher.calls(&key) < 3 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        handle.await.unwrap();
        server.await.unwrap();
        assert!(!*status.borrow());
    }

    #[tokio::test]
    async fn test_unreachable_server_stays_disconnected() {
        let cache = QueryCache::new(Arc::new(CountingFetcher::default()));
        let listener = RealtimeListener::new("ws://127.0.0.1:1", "secret", cache);
        let status = listener.status();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(listener.run(shutdown.clone()));

        sleep(Duration::from_millis(50)).await;
        assert!(!*status.borrow());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_status_notifies_only_on_flips() {
        let cache = QueryCache::new(Arc::new(CountingFetcher::default()));
        let listener = RealtimeListener::new("ws://127.0.0.1:1", "secret", cache);
        let mut status = listener.status();

        // Each failed reconnect reports "down" again
        for _ in 0..5 {
            listener.set_connected(false);
        }
        assert!(!status.has_changed().unwrap());

        listener.set_connected(true);
        assert!(status.has_changed().unwrap());
        assert!(*status.borrow_and_update());

        listener.set_connected(true);
        assert!(!status.has_changed().unwrap());

        listener.set_connected(false);
        assert!(status.has_changed().unwrap());
        assert!(!*status.borrow_and_update());
    }
}
