/// API route handlers
///
/// Organised by resource:
///
/// - `health`: liveness and dependency status
/// - `session`: session bootstrap after sign-in
/// - `houses`, `members`: households and member management
/// - `tasks`, `shopping`, `devices`: house-scoped data
/// - `invitations`: invitation issue and acceptance
/// - `notifications`, `push_subscriptions`: per-user notification surface
/// - `realtime`: change-event WebSocket

pub mod devices;
pub mod health;
pub mod houses;
pub mod invitations;
pub mod members;
pub mod notifications;
pub mod push_subscriptions;
pub mod realtime;
pub mod session;
pub mod shopping;
pub mod tasks;
