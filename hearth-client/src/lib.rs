//! # Hearth Client
//!
//! Keeps a local cache of a household's lists in step with the server.
//!
//! ## Modules
//!
//! - `query`: cached query identifiers and their REST paths
//! - `invalidator`: realtime event to query-key table
//! - `cache`: query cache with stale marking and active refetch
//! - `api`: REST fetcher
//! - `realtime`: WebSocket listener that drives invalidation
//! - `poller`: fallback refetching while the socket is down
//! - `config`: environment configuration
//!
//! ## Example
//!
//! ```no_run
//! use hearth_client::{api::ApiClient, cache::QueryCache, query::QueryKey, realtime::RealtimeListener};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(house: uuid::Uuid) -> Result<(), hearth_client::error::ClientError> {
//! let api = Arc::new(ApiClient::new("http://localhost:8080", "token")?);
//! let cache = QueryCache::new(api);
//! let _tasks = cache.observe(QueryKey::Tasks(house));
//!
//! let listener = RealtimeListener::new("ws://localhost:8080/v1/realtime", "token", cache.clone());
//! tokio::spawn(listener.run(CancellationToken::new()));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod invalidator;
pub mod poller;
pub mod query;
pub mod realtime;
