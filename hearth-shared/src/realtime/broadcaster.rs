/// Change broadcaster
///
/// After a mutation commits, the broadcaster resolves the house's members
/// through the [`MembershipDirectory`] and hands the event to the
/// [`RealtimeTransport`] once per member. Delivery is best-effort and
/// at-most-once: no retry, no persistence, no ordering across events.
///
/// Failures never propagate to the caller. A directory error is logged and
/// reported as zero deliveries.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use hearth_shared::directory::PgMembershipDirectory;
/// use hearth_shared::realtime::{ChangeBroadcaster, LocalTransport, RealtimeEvent, EventAction, SessionRegistry};
/// use serde_json::json;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, house_id: Uuid) {
/// let registry = SessionRegistry::default();
/// let broadcaster = ChangeBroadcaster::new(
///     Arc::new(PgMembershipDirectory::new(pool)),
///     Arc::new(LocalTransport::new(registry)),
/// );
///
/// let report = broadcaster
///     .broadcast_to_house(house_id, &RealtimeEvent::task(EventAction::Created, house_id, json!({})))
///     .await;
/// println!("{} members, {} sessions", report.members, report.sessions);
/// # }
/// ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use super::event::RealtimeEvent;
use super::registry::SessionRegistry;
use super::RealtimeError;
use crate::directory::MembershipDirectory;

/// Hands one event to one user's sessions, wherever they are connected
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Returns how many deliveries were made
    ///
    /// For the local transport that is the number of sessions reached; for
    /// a relay it is the number of instances the event was handed to.
    async fn deliver(&self, user_id: Uuid, event: &RealtimeEvent) -> Result<usize, RealtimeError>;
}

/// Delivers straight into this process's session registry
#[derive(Clone)]
pub struct LocalTransport {
    registry: SessionRegistry,
}

impl LocalTransport {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RealtimeTransport for LocalTransport {
    async fn deliver(&self, user_id: Uuid, event: &RealtimeEvent) -> Result<usize, RealtimeError> {
        Ok(self.registry.deliver(user_id, event))
    }
}

/// Outcome of a house broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Members resolved for the house
    pub members: usize,

    /// Deliveries made across all members
    pub sessions: usize,
}

#[derive(Clone)]
pub struct ChangeBroadcaster {
    directory: Arc<dyn MembershipDirectory>,
    transport: Arc<dyn RealtimeTransport>,
}

impl ChangeBroadcaster {
    pub fn new(directory: Arc<dyn MembershipDirectory>, transport: Arc<dyn RealtimeTransport>) -> Self {
        Self { directory, transport }
    }

    /// Sends `event` to every connected session of every member of `house_id`
    pub async fn broadcast_to_house(&self, house_id: Uuid, event: &RealtimeEvent) -> BroadcastReport {
        let members = match self.directory.members_of(house_id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(house_id = %house_id, error = %e, "Could not resolve house members for broadcast");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport {
            members: members.len(),
            sessions: 0,
        };

        for user_id in members {
            report.sessions += self.notify_user(user_id, event).await;
        }

        debug!(
            house_id = %house_id,
            event_type = event.event_type.as_str(),
            members = report.members,
            sessions = report.sessions,
            "Broadcast delivered"
        );

        report
    }

    /// Sends `event` to every connected session of one user
    pub async fn notify_user(&self, user_id: Uuid, event: &RealtimeEvent) -> usize {
        match self.transport.deliver(user_id, event).await {
            Ok(delivered) => delivered,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Realtime delivery failed");
                0
            }
        }
    }

    /// Broadcasts in the background to the event's house
    ///
    /// Used by request handlers once their mutation has committed; the
    /// response never waits for delivery.
    pub fn publish(&self, event: RealtimeEvent) {
        let this = self.clone();
        let span = tracing::debug_span!("broadcast", house_id = %event.house_id, event_type = event.event_type.as_str());

        tokio::spawn(
            async move {
                this.broadcast_to_house(event.house_id, &event).await;
            }
            .instrument(span),
        );
    }

    /// Sends a single-user event in the background
    pub fn publish_to_user(&self, user_id: Uuid, event: RealtimeEvent) {
        let this = self.clone();

        tokio::spawn(async move {
            this.notify_user(user_id, &event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectoryError, RemovedMember};
    use crate::realtime::event::EventAction;
    use serde_json::json;
    use std::collections::HashMap;

    struct FakeDirectory {
        houses: HashMap<Uuid, Vec<Uuid>>,
    }

    #[async_trait]
    impl MembershipDirectory for FakeDirectory {
        async fn members_of(&self, house_id: Uuid) -> Result<Vec<Uuid>, DirectoryError> {
            Ok(self.houses.get(&house_id).cloned().unwrap_or_default())
        }

        async fn remove_member(&self, house_id: Uuid, user_id: Uuid) -> Result<RemovedMember, DirectoryError> {
            Err(DirectoryError::NotFound { house_id, user_id })
        }
    }

    struct BrokenDirectory;

    #[async_trait]
    impl MembershipDirectory for BrokenDirectory {
        async fn members_of(&self, _house_id: Uuid) -> Result<Vec<Uuid>, DirectoryError> {
            Err(DirectoryError::DatabaseError(sqlx::Error::PoolTimedOut))
        }

        async fn remove_member(&self, house_id: Uuid, user_id: Uuid) -> Result<RemovedMember, DirectoryError> {
            Err(DirectoryError::NotFound { house_id, user_id })
        }
    }

    fn pending(session: &mut crate::realtime::registry::Session) -> usize {
        let mut count = 0;
        while session.try_recv().is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_fan_out_reaches_connected_members_only() {
        let house = Uuid::new_v4();
        let (a, b, c, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let registry = SessionRegistry::new(8);
        let broadcaster = ChangeBroadcaster::new(
            Arc::new(FakeDirectory {
                houses: HashMap::from([(house, vec![a, b, c])]),
            }),
            Arc::new(LocalTransport::new(registry.clone())),
        );

        let mut a_phone = registry.open(a);
        let mut a_laptop = registry.open(a);
        let mut b_phone = registry.open(b);
        let mut outsider_phone = registry.open(outsider);

        let event = RealtimeEvent::task(EventAction::Updated, house, json!({"id": "t1"}));
        let report = broadcaster.broadcast_to_house(house, &event).await;

        assert_eq!(report, BroadcastReport { members: 3, sessions: 3 });
        assert_eq!(pending(&mut a_phone), 1);
        assert_eq!(pending(&mut a_laptop), 1);
        assert_eq!(pending(&mut b_phone), 1);
        assert_eq!(pending(&mut outsider_phone), 0);
        assert!(!registry.is_connected(c));
    }

    #[tokio::test]
    async fn test_directory_failure_reports_zero() {
        let registry = SessionRegistry::new(8);
        let broadcaster = ChangeBroadcaster::new(
            Arc::new(BrokenDirectory),
            Arc::new(LocalTransport::new(registry.clone())),
        );

        let house = Uuid::new_v4();
        let event = RealtimeEvent::device(EventAction::Updated, house, json!({}));

        assert_eq!(broadcaster.broadcast_to_house(house, &event).await, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_notify_user_targets_one_user() {
        let registry = SessionRegistry::new(8);
        let broadcaster = ChangeBroadcaster::new(
            Arc::new(FakeDirectory { houses: HashMap::new() }),
            Arc::new(LocalTransport::new(registry.clone())),
        );

        let (bob, carol) = (Uuid::new_v4(), Uuid::new_v4());
        let mut bob_session = registry.open(bob);
        let mut carol_session = registry.open(carol);

        let event = RealtimeEvent::notification(Uuid::new_v4(), json!({"kind": "task_assigned"}));
        assert_eq!(broadcaster.notify_user(bob, &event).await, 1);

        assert_eq!(pending(&mut bob_session), 1);
        assert_eq!(pending(&mut carol_session), 0);
    }
}
