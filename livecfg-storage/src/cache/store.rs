//! Cache store: a key→value map plus a parallel key→metadata map.

use livecfg_core::{CacheError, LiveValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::traits::{CacheStats, EntryMetadata, EvictionStrategy, MetadataMap};

/// Named cache delegating every validity and eviction decision to its
/// strategy.
///
/// Not synchronized: every `get` mutates recency bookkeeping, so a cache
/// shared between callers must be wrapped in a [`SharedCache`].
#[derive(Debug)]
pub struct Cache {
    name: String,
    strategy: Box<dyn EvictionStrategy>,
    entries: HashMap<String, LiveValue>,
    meta: MetadataMap,
    stats: CacheStats,
}

impl Cache {
    /// Create a cache with a generated unique name.
    pub fn new(strategy: Box<dyn EvictionStrategy>) -> Self {
        Self::named(Uuid::now_v7().to_string(), strategy)
    }

    pub fn named(name: impl Into<String>, strategy: Box<dyn EvictionStrategy>) -> Self {
        Self {
            name: name.into(),
            strategy,
            entries: HashMap::new(),
            meta: MetadataMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy_kind(&self) -> &'static str {
        self.strategy.kind()
    }

    /// Insert or overwrite `key`.
    ///
    /// The strategy may evict other keys as a side effect.
    pub fn set(&mut self, key: impl Into<String>, value: LiveValue) {
        let key = key.into();
        let evicted = self.strategy.on_insertion(&key, &value, &mut self.meta);
        self.entries.insert(key, value);

        for victim in evicted {
            self.entries.remove(&victim);
            self.stats.evictions += 1;
            tracing::debug!(cache = %self.name, key = %victim, "Evicted cache entry");
        }
    }

    /// Read `key`.
    ///
    /// A valid entry is served and its recency updated. An invalid entry is
    /// purged from both maps; the strategy's invalidation fallback is served
    /// if it produced one, otherwise the read fails with
    /// [`CacheError::MissingKey`] exactly like an absent key.
    pub fn get(&mut self, key: &str) -> Result<LiveValue, CacheError> {
        let Some(value) = self.entries.get(key) else {
            self.stats.misses += 1;
            return Err(CacheError::MissingKey {
                key: key.to_string(),
            });
        };

        if self.strategy.is_valid(self.meta.get(key)) {
            let value = value.clone();
            self.strategy.on_access(key, &mut self.meta);
            self.stats.hits += 1;
            return Ok(value);
        }

        let stale = self.entries.remove(key).unwrap_or(LiveValue::Null);
        let fallback = self.strategy.on_invalidation(key, &stale);
        self.meta.remove(key);
        self.stats.misses += 1;
        self.stats.invalidations += 1;
        tracing::debug!(cache = %self.name, key = %key, "Purged invalid cache entry");

        fallback.ok_or_else(|| CacheError::MissingKey {
            key: key.to_string(),
        })
    }

    /// Whether `key` is present and currently valid. Does not touch recency.
    pub fn is_valid(&self, key: &str) -> bool {
        self.entries.contains_key(key) && self.strategy.is_valid(self.meta.get(key))
    }

    pub fn metadata(&self, key: &str) -> Option<&EntryMetadata> {
        self.meta.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove `key` regardless of validity.
    pub fn remove(&mut self, key: &str) -> Option<LiveValue> {
        let removed = self.entries.remove(key);
        self.meta.remove(key);
        self.strategy.on_removal(key);
        removed
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.meta.clear();
        self.strategy.on_clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len() as u64,
            ..self.stats.clone()
        }
    }
}

/// A [`Cache`] behind a mutex, shareable between resolvers and a registry.
#[derive(Debug, Clone)]
pub struct SharedCache {
    name: Arc<str>,
    inner: Arc<Mutex<Cache>>,
}

impl SharedCache {
    pub fn new(cache: Cache) -> Self {
        Self {
            name: Arc::from(cache.name()),
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock the cache for exclusive use.
    pub fn lock(&self) -> Result<MutexGuard<'_, Cache>, CacheError> {
        self.inner.lock().map_err(|_| CacheError::LockPoisoned {
            name: self.name.to_string(),
        })
    }

    /// Whether both handles point at the same cache.
    pub fn ptr_eq(&self, other: &SharedCache) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<Cache> for SharedCache {
    fn from(cache: Cache) -> Self {
        Self::new(cache)
    }
}
