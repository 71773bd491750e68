//! In-process caching for directory listings and registry statistics.
//!
//! Every cache is a [`TtlCache`]: strict time-to-live, LRU-bounded, with
//! concurrent misses on one key coalesced into a single fetch. Keys are plain
//! strings grouped by prefix (see [`keys`]) so revalidation can drop whole
//! families at once.
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 512
//! list_ttl_seconds = 60
//! stats_ttl_seconds = 3600
//! ```

mod config;
pub mod keys;
pub(crate) mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::InvalidationScope;
pub use store::TtlCache;
