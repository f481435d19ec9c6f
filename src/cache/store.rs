//! TTL-bounded LRU store for serialized query results.

use std::sync::{RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tracing::warn;
use uuid::Uuid;

use super::config::CacheConfig;
use super::keys::CacheKey;

const SOURCE: &str = "cache::store";
pub(crate) const METRIC_READ_CACHE_HIT_TOTAL: &str = "pressroom_read_cache_hit_total";
pub(crate) const METRIC_READ_CACHE_MISS_TOTAL: &str = "pressroom_read_cache_miss_total";
pub(crate) const METRIC_READ_CACHE_EXPIRED_TOTAL: &str = "pressroom_read_cache_expired_total";
pub(crate) const METRIC_READ_CACHE_EVICT_TOTAL: &str = "pressroom_read_cache_evict_total";

/// A serialized response body plus the ids of the entities it lists, so a hit
/// can still record impressions without decoding the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
    pub payload: Bytes,
    pub ids: Vec<Uuid>,
}

struct Entry {
    value: CachedQuery,
    expires_at: Instant,
}

pub struct ReadCache {
    entries: RwLock<LruCache<CacheKey, Entry>>,
    ttl: Duration,
}

impl ReadCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            ttl: config.ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a live entry. Expired entries are removed and reported as misses.
    pub fn get(&self, key: &CacheKey) -> Option<CachedQuery> {
        let namespace = key.namespace().as_str();
        let mut entries = self.entries_mut("get");

        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                counter!(METRIC_READ_CACHE_HIT_TOTAL, "namespace" => namespace).increment(1);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            counter!(METRIC_READ_CACHE_EXPIRED_TOTAL, "namespace" => namespace).increment(1);
        }
        counter!(METRIC_READ_CACHE_MISS_TOTAL, "namespace" => namespace).increment(1);
        None
    }

    pub fn set(&self, key: CacheKey, value: CachedQuery) {
        self.set_with_ttl(key, value, self.ttl);
    }

    /// Store `value` for `ttl`. A TTL too large to represent as an instant is
    /// not cached at all.
    pub fn set_with_ttl(&self, key: CacheKey, value: CachedQuery, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            warn!(
                target_module = SOURCE,
                namespace = key.namespace().as_str(),
                ttl_secs = ttl.as_secs(),
                "cache ttl overflows the clock; entry not stored"
            );
            return;
        };
        let entry = Entry { value, expires_at };
        let evicted = self.entries_mut("set").push(key.clone(), entry);

        // `push` also returns the previous value when the key was already present.
        if let Some((evicted_key, _)) = evicted.filter(|(evicted_key, _)| *evicted_key != key) {
            counter!(METRIC_READ_CACHE_EVICT_TOTAL, "namespace" => evicted_key.namespace().as_str())
                .increment(1);
        }
    }

    pub fn clear(&self) {
        self.entries_mut("clear").clear();
    }

    /// Number of stored entries, including ones that have expired but not yet been read.
    pub fn len(&self) -> usize {
        self.entries_mut("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // `LruCache::get` promotes the entry, so reads need the write lock as well.
    fn entries_mut(&self, op: &'static str) -> RwLockWriteGuard<'_, LruCache<CacheKey, Entry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    target_module = SOURCE,
                    result = "poisoned_recovered",
                    "Recovered from poisoned read cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}
