/// In-process registry of live WebSocket sessions
///
/// One user may hold several sessions (tabs, devices). Each session owns a
/// bounded queue; delivery never blocks. When a queue is full the event is
/// dropped for that session and a warning is logged. Clients recover
/// through their reconnect/poll fallback.
///
/// Sessions are attached only through [`SessionRegistry::open`]. The returned
/// [`Session`] detaches itself when dropped, so a socket task that ends for
/// any reason cannot leak its entry.
///
/// The map is guarded by a `std::sync::RwLock` that is never held across an
/// await.
///
/// # Example
///
/// ```
/// use hearth_shared::realtime::registry::SessionRegistry;
/// use uuid::Uuid;
///
/// # async fn example() {
/// let registry = SessionRegistry::new(64);
/// let user_id = Uuid::new_v4();
///
/// let mut session = registry.open(user_id);
/// assert_eq!(registry.deliver_payload(user_id, "{}".into()), 1);
/// assert_eq!(session.recv().await.as_deref(), Some("{}"));
///
/// drop(session);
/// assert!(!registry.is_connected(user_id));
/// # }
/// ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::event::RealtimeEvent;

/// Default per-session queue length
pub const DEFAULT_SESSION_BUFFER: usize = 64;

pub type SessionId = u64;

type Sessions = HashMap<Uuid, HashMap<SessionId, mpsc::Sender<Arc<str>>>>;

struct RegistryInner {
    sessions: RwLock<Sessions>,
    next_id: AtomicU64,
    buffer: usize,
}

/// Shared handle to the registry
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Creates an empty registry with `buffer` queued events per session
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Attaches a new session for `user_id`
    pub fn open(&self, user_id: Uuid) -> Session {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);

        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_default()
            .insert(id, tx);

        debug!(user_id = %user_id, session_id = id, "Realtime session opened");

        Session {
            id,
            user_id,
            receiver: rx,
            registry: self.clone(),
        }
    }

    /// Serializes `event` once and queues it on every session of `user_id`
    ///
    /// Returns the number of sessions that accepted the event.
    pub fn deliver(&self, user_id: Uuid, event: &RealtimeEvent) -> usize {
        match event.to_json() {
            Ok(json) => self.deliver_payload(user_id, json.into()),
            Err(e) => {
                warn!(error = %e, "Failed to serialize realtime event");
                0
            }
        }
    }

    /// Queues an already serialized frame on every session of `user_id`
    pub fn deliver_payload(&self, user_id: Uuid, payload: Arc<str>) -> usize {
        let sessions = self.inner.sessions.read().unwrap_or_else(PoisonError::into_inner);

        let Some(user_sessions) = sessions.get(&user_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (session_id, tx) in user_sessions {
            match tx.try_send(Arc::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(user_id = %user_id, session_id, "Session queue full, dropping event");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(user_id = %user_id, session_id, "Session closed before delivery");
                }
            }
        }

        delivered
    }

    pub fn is_connected(&self, user_id: Uuid) -> bool {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .is_some_and(|s| !s.is_empty())
    }

    /// Total number of open sessions
    pub fn session_count(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Number of users with at least one session
    pub fn connected_users(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn detach(&self, user_id: Uuid, id: SessionId) {
        let mut sessions = self.inner.sessions.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(user_sessions) = sessions.get_mut(&user_id) {
            user_sessions.remove(&id);
            if user_sessions.is_empty() {
                sessions.remove(&user_id);
            }
        }

        debug!(user_id = %user_id, session_id = id, "Realtime session closed");
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_BUFFER)
    }
}

/// A live session; detaches from the registry on drop
pub struct Session {
    id: SessionId,
    user_id: Uuid,
    receiver: mpsc::Receiver<Arc<str>>,
    registry: SessionRegistry,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Next serialized frame for this session
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }

    /// Next queued frame without waiting
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.detach(self.user_id, self.id);
    }
}
