//! Explicit registry of named caches.
//!
//! Created once by the owner of the configuration tree and passed to
//! whatever needs to look caches up or flush them. Dropping the registry
//! releases its handles; caches still referenced by resolvers stay alive.

use livecfg_core::CacheError;
use std::collections::HashMap;

use super::store::{Cache, SharedCache};
use super::traits::EvictionStrategy;

#[derive(Debug, Default)]
pub struct CacheRegistry {
    caches: HashMap<String, SharedCache>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a cache. A generated name is used when `name` is None.
    pub fn create(
        &mut self,
        name: Option<&str>,
        strategy: Box<dyn EvictionStrategy>,
    ) -> Result<SharedCache, CacheError> {
        let cache = match name {
            Some(name) => Cache::named(name, strategy),
            None => Cache::new(strategy),
        };
        let shared = SharedCache::new(cache);
        self.register(shared.clone())?;
        Ok(shared)
    }

    /// Register an existing cache under its own name.
    pub fn register(&mut self, cache: SharedCache) -> Result<(), CacheError> {
        if self.caches.contains_key(cache.name()) {
            return Err(CacheError::DuplicateName {
                name: cache.name().to_string(),
            });
        }
        tracing::debug!(cache = %cache.name(), "Registered cache");
        self.caches.insert(cache.name().to_string(), cache);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedCache> {
        self.caches.get(name).cloned()
    }

    pub fn remove(&mut self, name: &str) -> Option<SharedCache> {
        self.caches.remove(name)
    }

    /// Clear one cache.
    pub fn clear(&self, name: &str) -> Result<(), CacheError> {
        let cache = self.caches.get(name).ok_or_else(|| CacheError::UnknownCache {
            name: name.to_string(),
        })?;
        cache.lock()?.clear();
        Ok(())
    }

    /// Clear every registered cache.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        for cache in self.caches.values() {
            cache.lock()?.clear();
        }
        Ok(())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::usage::LruStrategy;
    use serde_json::json;

    #[test]
    fn test_create_and_lookup() {
        let mut registry = CacheRegistry::new();
        let cache = registry
            .create(Some("secrets"), Box::new(LruStrategy::new(8)))
            .unwrap();

        let found = registry.get("secrets").unwrap();
        assert!(found.ptr_eq(&cache));
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = CacheRegistry::new();
        registry
            .create(Some("dup"), Box::new(LruStrategy::new(1)))
            .unwrap();

        let err = registry
            .create(Some("dup"), Box::new(LruStrategy::new(1)))
            .unwrap_err();
        assert_eq!(
            err,
            CacheError::DuplicateName {
                name: "dup".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unnamed_caches_get_unique_names() {
        let mut registry = CacheRegistry::new();
        registry.create(None, Box::new(LruStrategy::new(1))).unwrap();
        registry.create(None, Box::new(LruStrategy::new(1))).unwrap();
        assert_eq!(registry.names().len(), 2);
    }

    #[test]
    fn test_clear_and_clear_all() {
        let mut registry = CacheRegistry::new();
        let a = registry.create(Some("a"), Box::new(LruStrategy::new(4))).unwrap();
        let b = registry.create(Some("b"), Box::new(LruStrategy::new(4))).unwrap();
        a.lock().unwrap().set("k", json!(1));
        b.lock().unwrap().set("k", json!(2));

        registry.clear("a").unwrap();
        assert_eq!(
            registry.clear("missing"),
            Err(CacheError::UnknownCache {
                name: "missing".to_string()
            })
        );
        assert!(a.lock().unwrap().is_empty());
        assert_eq!(b.lock().unwrap().len(), 1);

        registry.clear_all().unwrap();
        assert!(b.lock().unwrap().is_empty());
    }

    #[test]
    fn test_remove_releases_handle() {
        let mut registry = CacheRegistry::new();
        let cache = registry.create(Some("gone"), Box::new(LruStrategy::new(1))).unwrap();
        let removed = registry.remove("gone").unwrap();

        assert!(removed.ptr_eq(&cache));
        assert!(registry.is_empty());
        assert_eq!(registry.names(), Vec::<String>::new());
    }
}
