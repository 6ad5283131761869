/// Redis integration
///
/// Used for cross-instance realtime fan-out:
///
/// ```text
/// ┌────────────┐  PUBLISH realtime:user:{id}  ┌─────────┐
/// │ instance A │ ───────────────────────────> │  Redis  │
/// └────────────┘                              └─────────┘
///                                                  │ PSUBSCRIBE realtime:user:*
///                                                  ▼
///                                  every instance's local session registry
/// ```

pub mod client;

pub use client::{sanitize_url, RedisClient, RedisClientError, RedisConfig};
