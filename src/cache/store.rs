//! TTL cache storage.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use lru::LruCache;
use metrics::counter;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// LRU-bounded map whose entries expire a fixed time after they are stored.
///
/// Expired entries are dropped lazily on read and are never handed out, not
/// even when a refresh fails. Misses on the same key are serialized through a
/// per-key async lock, so a burst of requests for one cold key runs `fetch`
/// once and the rest read the stored result.
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    entries: RwLock<LruCache<String, CacheEntry<V>>>,
    inflight: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync,
{
    /// `name` labels the cache's metrics; `ttl` is the default lifetime.
    pub fn new(name: &'static str, ttl: Duration, config: &CacheConfig) -> Self {
        Self {
            name,
            ttl,
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
            inflight: DashMap::new(),
        }
    }

    /// Return the stored value for `key` if it is younger than `ttl`.
    pub fn get_fresh(&self, key: &str, ttl: Duration) -> Option<V> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get_fresh");
        let fresh = match entries.get(key) {
            Some(entry) if entry.is_fresh(now, ttl) => Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };
        if fresh.is_none() {
            entries.pop(key);
            counter!("uidir_cache_expired_total", "cache" => self.name).increment(1);
        }
        fresh
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_fresh(key, self.ttl)
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        let evicted = rw_write(&self.entries, SOURCE, "insert").push(key.clone(), entry);
        counter!("uidir_cache_store_total", "cache" => self.name).increment(1);
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                counter!("uidir_cache_evict_total", "cache" => self.name).increment(1);
            }
        }
    }

    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_fetch_with_ttl(key, self.ttl, fetch).await
    }

    /// Serve a fresh entry or run `fetch` and store its success.
    ///
    /// A failed fetch writes nothing and leaves any previous entry in place
    /// for the next caller to expire.
    pub async fn get_or_fetch_with_ttl<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if ttl.is_zero() {
            return fetch().await;
        }

        if let Some(value) = self.get_fresh(key, ttl) {
            counter!("uidir_cache_hit_total", "cache" => self.name).increment(1);
            return Ok(value);
        }

        let gate = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let guard = gate.lock().await;

        // Another caller may have filled the entry while we waited.
        if let Some(value) = self.get_fresh(key, ttl) {
            drop(guard);
            self.release_gate(key, gate);
            counter!("uidir_cache_hit_total", "cache" => self.name).increment(1);
            return Ok(value);
        }

        counter!("uidir_cache_miss_total", "cache" => self.name).increment(1);
        let result = fetch().await;
        if let Ok(value) = &result {
            self.insert(key, value.clone());
        }

        drop(guard);
        self.release_gate(key, gate);
        result
    }

    fn release_gate(&self, key: &str, gate: Arc<AsyncMutex<()>>) {
        drop(gate);
        // Only the map still holds the gate once no caller is queued on it.
        self.inflight
            .remove_if(key, |_, current| Arc::strong_count(current) == 1);
    }

    /// Remove exactly `key`; returns whether an entry was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = rw_write(&self.entries, SOURCE, "remove").pop(key).is_some();
        if removed {
            counter!("uidir_cache_invalidate_total", "cache" => self.name).increment(1);
        }
        removed
    }

    /// Remove every entry whose key starts with `prefix`; returns how many were dropped.
    pub fn invalidate(&self, prefix: &str) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        drop(entries);

        if !doomed.is_empty() {
            counter!("uidir_cache_invalidate_total", "cache" => self.name)
                .increment(doomed.len() as u64);
        }
        doomed.len()
    }

    pub fn invalidate_all(&self) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate_all");
        let dropped = entries.len();
        entries.clear();
        drop(entries);

        if dropped > 0 {
            counter!("uidir_cache_invalidate_total", "cache" => self.name)
                .increment(dropped as u64);
        }
        dropped
    }

    /// Keys currently held, fresh or not, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        rw_read(&self.entries, SOURCE, "keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
