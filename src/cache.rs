//! Route table lookup caching.
//!
//! [`ResolutionCache`] remembers which [`RouteTable`](crate::RouteTable) entry
//! a url path matched and the parameters captured from it, so repeated pushes
//! of the same url skip the pattern scan. It is gated behind the `cache`
//! feature flag and uses the [`lru`] crate internally.
//!
//! The table clears the cache whenever an entry is registered, so a cached
//! match never outlives the table layout that produced it.
//!
//! # Examples
//!
//! ```
//! use hybrid_navigator::{ResolutionCache, RouteParams};
//!
//! let mut cache = ResolutionCache::new();
//! cache.insert("/user/7", 2, RouteParams::new().with("id", "7"));
//!
//! let (index, params) = cache.get("/user/7").unwrap();
//! assert_eq!(index, 2);
//! assert_eq!(params.get_str("id"), Some("7"));
//! assert_eq!(cache.stats().hits, 1);
//! ```

use crate::params::RouteParams;
use crate::{debug_log, trace_log};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Counters tracking cache effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: usize,
    /// Lookups that fell through to a table scan.
    pub misses: usize,
    /// Number of full invalidations (via [`ResolutionCache::clear`]).
    pub invalidations: usize,
}

impl CacheStats {
    /// Hit rate as a value in `0.0..=1.0`; `0.0` before any lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CachedMatch {
    index: usize,
    params: RouteParams,
}

/// LRU cache of url path → matched table entry.
#[derive(Debug)]
pub struct ResolutionCache {
    matches: LruCache<String, CachedMatch>,
    stats: CacheStats,
}

impl ResolutionCache {
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
        Some(capacity) => capacity,
        None => NonZeroUsize::MIN,
    };

    /// Create a cache holding up to 256 paths.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            matches: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Look up the entry index and captured params for `path`.
    pub fn get(&mut self, path: &str) -> Option<(usize, RouteParams)> {
        if let Some(cached) = self.matches.get(path) {
            self.stats.hits += 1;
            trace_log!("Resolution cache hit for '{}'", path);
            Some((cached.index, cached.params.clone()))
        } else {
            self.stats.misses += 1;
            trace_log!("Resolution cache miss for '{}'", path);
            None
        }
    }

    /// Remember that `path` matched entry `index`, capturing `params`.
    pub fn insert(&mut self, path: impl Into<String>, index: usize, params: RouteParams) {
        self.matches
            .push(path.into(), CachedMatch { index, params });
    }

    /// Drop every cached match.
    pub fn clear(&mut self) {
        let removed = self.matches.len();
        self.matches.clear();
        self.stats.invalidations += 1;
        debug_log!(
            "Resolution cache cleared: {} entries removed ({} invalidations, hit rate {:.1}%)",
            removed,
            self.stats.invalidations,
            self.stats.hit_rate() * 100.0
        );
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}
