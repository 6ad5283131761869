/// Realtime change propagation
///
/// ```text
/// handler commits ──> ChangeBroadcaster ──members_of──> MembershipDirectory
///                           │
///                           ▼ per member
///                    RealtimeTransport
///                     ├─ LocalTransport ──> SessionRegistry ──> WebSocket sessions
///                     └─ RedisRelay ──PUBLISH──> every instance's SessionRegistry
/// ```
///
/// - `event`: wire format of events and control frames
/// - `registry`: live sessions with bounded queues
/// - `broadcaster`: house fan-out and the transport seam
/// - `relay`: Redis pub/sub transport for multi-instance deployments

pub mod broadcaster;
pub mod event;
pub mod registry;
pub mod relay;

pub use broadcaster::{BroadcastReport, ChangeBroadcaster, LocalTransport, RealtimeTransport};
pub use event::{ClientFrame, ControlFrame, EventAction, EventType, RealtimeEvent, ServerFrame};
pub use registry::{Session, SessionRegistry};
pub use relay::RedisRelay;

use crate::redis::RedisClientError;

/// Error type for realtime delivery
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    RedisClient(#[from] RedisClientError),
}
