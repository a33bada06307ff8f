//! A key-value cache whose entries expire after a fixed time-to-live.
use std::{collections::HashMap, fmt::Debug, future::Future, hash::Hash, sync::Arc, time::Duration};

use iox_time::{Time, TimeProvider};
use observability_deps::tracing::debug;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    /// `None` when `now + ttl` overflows, i.e. never.
    expires_at: Option<Time>,
}

impl<V> Entry<V> {
    fn is_valid(&self, now: Time) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// Get-or-load cache with per-entry expiry.
///
/// Lookups run in parallel. A miss takes the exclusive lock for the whole
/// check-load-store sequence, so concurrent misses on a key run the loader
/// one after the other and later callers usually find the fresh entry.
/// Expired entries are replaced on the next access, never evicted eagerly.
#[derive(Debug)]
pub struct LoadingCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
    time_provider: Arc<dyn TimeProvider>,
}

impl<K, V> LoadingCache<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: Clone,
{
    pub fn new(ttl: Duration, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            time_provider,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, calling `loader` when it is absent
    /// or expired.
    ///
    /// Loader errors are returned as is and nothing is cached.
    pub async fn get<F, Fut, E>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                if entry.is_valid(self.time_provider.now()) {
                    debug!(?key, "loading cache hit");
                    return Ok(entry.value.clone());
                }
            }
        }

        let mut entries = self.entries.write().await;
        // another caller may have loaded the key while we waited for the lock
        if let Some(entry) = entries.get(&key) {
            if entry.is_valid(self.time_provider.now()) {
                return Ok(entry.value.clone());
            }
        }

        debug!(?key, "loading cache miss");
        let value = loader(&key).await?;
        let expires_at = self.time_provider.now().checked_add(self.ttl);
        entries.insert(
            key,
            Entry {
                value: value.clone(),
                expires_at,
            },
        );

        Ok(value)
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
