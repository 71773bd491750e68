//! Cache configuration.

use std::{num::NonZeroUsize, time::Duration};

const DEFAULT_MAX_ENTRIES: usize = 512;
const DEFAULT_LIST_TTL: Duration = Duration::from_secs(60);
const DEFAULT_STATS_TTL: Duration = Duration::from_secs(60 * 60);

/// Sizing and lifetimes for the in-process caches.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false, every lookup goes straight to its source.
    pub enabled: bool,
    /// Maximum entries held by each cache before LRU eviction.
    pub max_entries: usize,
    /// Lifetime of listing and detail pages.
    pub list_ttl: Duration,
    /// Lifetime of registry download series and package details.
    pub stats_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            list_ttl: DEFAULT_LIST_TTL,
            stats_ttl: DEFAULT_STATS_TTL,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_entries: settings.max_entries.get(),
            list_ttl: settings.list_ttl,
            stats_ttl: settings.stats_ttl,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    /// TTL applied to listing pages; zero when caching is disabled.
    pub fn effective_list_ttl(&self) -> Duration {
        if self.enabled {
            self.list_ttl
        } else {
            Duration::ZERO
        }
    }

    /// TTL applied to registry data; zero when caching is disabled.
    pub fn effective_stats_ttl(&self) -> Duration {
        if self.enabled {
            self.stats_ttl
        } else {
            Duration::ZERO
        }
    }
}
