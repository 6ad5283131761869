/// Query cache with stale marking
///
/// Entries hold the last JSON body fetched for a [`QueryKey`]. Invalidation
/// never edits that body; it only flags the entry stale:
///
/// - **active** entries (at least one live [`ActiveQuery`] guard) are
///   refetched right away
/// - **inactive** entries are refetched on the next [`QueryCache::get`]
///
/// The entry map sits behind a `std::sync::Mutex` that is never held across
/// an await. Fetches run outside the lock.
///
/// # Example
///
/// ```no_run
/// use hearth_client::cache::QueryCache;
/// use hearth_client::query::QueryKey;
/// # use std::sync::Arc;
/// # async fn example(cache: Arc<QueryCache>, house: uuid::Uuid) -> Result<(), hearth_client::error::ClientError> {
/// let _watch = cache.observe(QueryKey::Tasks(house));
/// let tasks = cache.get(QueryKey::Tasks(house)).await?;
///
/// // an event arrives
/// cache.invalidate(&[QueryKey::Tasks(house)]).await;
/// # Ok(())
/// # }
/// ```

use crate::error::ClientError;
use crate::query::QueryKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Source of truth for query data
#[async_trait]
pub trait QueryFetcher: Send + Sync {
    async fn fetch(&self, key: &QueryKey) -> Result<JsonValue, ClientError>;
}

#[derive(Debug, Default)]
struct Entry {
    data: Option<JsonValue>,
    stale: bool,
    observers: usize,
    fetched_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn needs_fetch(&self) -> bool {
        self.stale || self.data.is_none()
    }
}

/// Snapshot of one entry, for display and tests
#[derive(Debug, Clone, PartialEq)]
pub struct EntryState {
    pub stale: bool,
    pub active: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

pub struct QueryCache {
    fetcher: Arc<dyn QueryFetcher>,
    entries: Mutex<HashMap<QueryKey, Entry>>,
}

impl QueryCache {
    pub fn new(fetcher: Arc<dyn QueryFetcher>) -> Arc<Self> {
        Arc::new(Self {
            fetcher,
            entries: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `key` as observed until the guard is dropped
    pub fn observe(self: &Arc<Self>, key: QueryKey) -> ActiveQuery {
        self.lock().entry(key).or_default().observers += 1;

        ActiveQuery {
            cache: Arc::clone(self),
            key,
        }
    }

    /// Cached data if fresh, otherwise fetched and stored
    pub async fn get(&self, key: QueryKey) -> Result<JsonValue, ClientError> {
        {
            let entries = self.lock();
            if let Some(entry) = entries.get(&key) {
                if let (false, Some(data)) = (entry.needs_fetch(), entry.data.as_ref()) {
                    return Ok(data.clone());
                }
            }
        }

        self.refetch(key).await
    }

    /// Last fetched data without touching the network, stale or not
    pub fn peek(&self, key: &QueryKey) -> Option<JsonValue> {
        self.lock().get(key).and_then(|entry| entry.data.clone())
    }

    pub fn state(&self, key: &QueryKey) -> Option<EntryState> {
        self.lock().get(key).map(|entry| EntryState {
            stale: entry.needs_fetch(),
            active: entry.observers > 0,
            fetched_at: entry.fetched_at,
        })
    }

    /// Marks `keys` stale and refetches those that are active
    ///
    /// Returns the keys that were refetched. Fetch failures leave the entry
    /// stale and are logged, never returned.
    pub async fn invalidate(&self, keys: &[QueryKey]) -> Vec<QueryKey> {
        let active = {
            let mut entries = self.lock();
            keys.iter()
                .filter_map(|key| {
                    let entry = entries.get_mut(key)?;
                    entry.stale = true;
                    (entry.observers > 0).then_some(*key)
                })
                .collect::<Vec<_>>()
        };

        debug!(invalidated = keys.len(), refetching = active.len(), "Invalidated queries");
        self.refetch_each(active).await
    }

    /// Marks every entry stale and refetches the active ones
    pub async fn invalidate_all(&self) -> Vec<QueryKey> {
        let keys: Vec<QueryKey> = self.lock().keys().copied().collect();
        self.invalidate(&keys).await
    }

    /// Refetches every active entry regardless of staleness
    pub async fn refetch_active(&self) -> Vec<QueryKey> {
        let active: Vec<QueryKey> = self
            .lock()
            .iter()
            .filter(|(_, entry)| entry.observers > 0)
            .map(|(key, _)| *key)
            .collect();

        self.refetch_each(active).await
    }

    async fn refetch_each(&self, keys: Vec<QueryKey>) -> Vec<QueryKey> {
        let mut refetched = Vec::with_capacity(keys.len());
        for key in keys {
            match self.refetch(key).await {
                Ok(_) => refetched.push(key),
                Err(e) => warn!(query = %key, error = %e, "Refetch failed"),
            }
        }
        refetched
    }

    async fn refetch(&self, key: QueryKey) -> Result<JsonValue, ClientError> {
        let data = self.fetcher.fetch(&key).await?;

        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        entry.data = Some(data.clone());
        entry.stale = false;
        entry.fetched_at = Some(Utc::now());

        Ok(data)
    }

    fn release(&self, key: &QueryKey) {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }
}

/// Keeps a query active while held
#[must_use = "the query is inactive once the guard is dropped"]
pub struct ActiveQuery {
    cache: Arc<QueryCache>,
    key: QueryKey,
}

impl ActiveQuery {
    pub fn key(&self) -> QueryKey {
        self.key
    }
}

impl Drop for ActiveQuery {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}
