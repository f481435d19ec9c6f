//! Read-side response cache.
//!
//! List and detail results are cached as serialized bodies under a key derived
//! from every query parameter. Entries live for a fixed TTL; nothing invalidates
//! them early, so readers may see results up to one TTL old.
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 60
//! capacity = 1000
//! ```

mod config;
mod keys;
mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, CacheNamespace, QuerySignature};
pub use store::{CachedQuery, ReadCache};

pub(crate) use store::{
    METRIC_READ_CACHE_EVICT_TOTAL, METRIC_READ_CACHE_EXPIRED_TOTAL, METRIC_READ_CACHE_HIT_TOTAL,
    METRIC_READ_CACHE_MISS_TOTAL,
};
