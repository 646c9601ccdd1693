//! Eviction strategy capability and cache statistics.
//!
//! A [`Cache`](super::Cache) owns its values and a parallel metadata map; every
//! validity, insertion and eviction decision is delegated to an injected
//! [`EvictionStrategy`].

use chrono::{DateTime, Utc};
use livecfg_core::{CachePolicy, Clock, LiveValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ttl::TtlStrategy;
use super::usage::{LruStrategy, MruStrategy};

/// Strategy-defined metadata stored alongside each cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryMetadata {
    /// Entry is valid strictly before this instant (TTL).
    ExpiresAt(DateTime<Utc>),
    /// Entry is tracked by a usage-ordered index (LRU/MRU).
    Tracked,
}

/// Metadata keyed by cache key.
pub type MetadataMap = HashMap<String, EntryMetadata>;

/// Pluggable policy deciding cache-entry validity and removal.
///
/// Implementations keep any internal index in lock-step with the metadata
/// map: a key present in one is present in the other once a callback returns.
pub trait EvictionStrategy: Send + fmt::Debug {
    /// Short name for logs.
    fn kind(&self) -> &'static str;

    /// Whether an entry carrying `meta` may still be served.
    fn is_valid(&self, meta: Option<&EntryMetadata>) -> bool;

    /// Record metadata for a freshly set `key`.
    ///
    /// Returns the keys evicted as a side effect, already removed from
    /// `meta`. The key just inserted is never among them.
    fn on_insertion(&mut self, key: &str, value: &LiveValue, meta: &mut MetadataMap)
        -> Vec<String>;

    /// Update recency bookkeeping after a valid read of `key`.
    fn on_access(&mut self, _key: &str, _meta: &mut MetadataMap) {}

    /// Called when a read finds `key` invalid, before it is purged.
    ///
    /// Receives the stale value; may return a fallback to serve instead.
    fn on_invalidation(&mut self, _key: &str, _stale: &LiveValue) -> Option<LiveValue> {
        None
    }

    /// Forget `key` after an explicit removal.
    fn on_removal(&mut self, _key: &str) {}

    /// Forget every key after the cache is cleared.
    fn on_clear(&mut self) {}
}

/// Build the strategy described by `policy`.
pub fn strategy_for(policy: &CachePolicy, clock: Arc<dyn Clock>) -> Box<dyn EvictionStrategy> {
    match policy {
        CachePolicy::Ttl { seconds } => Box::new(TtlStrategy::with_clock(
            std::time::Duration::from_secs(*seconds),
            clock,
        )),
        CachePolicy::Lru { capacity } => Box::new(LruStrategy::new(*capacity)),
        CachePolicy::Mru { capacity } => Box::new(MruStrategy::new(*capacity)),
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including reads that found a stale entry.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of entries purged because they were no longer valid.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
