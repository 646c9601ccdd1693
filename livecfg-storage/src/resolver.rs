//! Live state resolver: retry and cache composed around a raw source fetch.
//!
//! Composition order is cache ⊇ retry ⊇ fetch. A cache hit skips the retry
//! machinery entirely, so a cached value is still served while the source
//! is failing.

use livecfg_core::{
    retry, BackoffPolicy, CacheError, CachePolicy, Clock, LiveResult, LiveStateSource, LiveValue,
    ResolutionError, ResolverConfig, StateResolver, SystemClock,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{strategy_for, Cache, SharedCache};

/// Resolves the current value of one live attribute.
///
/// Blocking and single-threaded per call: `resolve` holds the calling
/// thread through every retry sleep. The cache lock is released while the
/// source is fetched, so resolvers sharing a cache do not serialize on a
/// slow source.
pub struct LiveResolver<S> {
    source: S,
    retry_policy: Option<BackoffPolicy>,
    cache: Option<SharedCache>,
    cache_key: String,
    clock: Arc<dyn Clock>,
}

impl<S: LiveStateSource> LiveResolver<S> {
    pub fn builder(source: S) -> LiveResolverBuilder<S> {
        LiveResolverBuilder::new(source)
    }

    /// Resolver with neither retry nor cache.
    pub fn direct(source: S) -> Self {
        Self::builder(source).build()
    }

    /// Build from construction-time options.
    ///
    /// When caching is enabled a private cache is constructed from
    /// `config.cache_policy` on `clock`.
    pub fn from_config(
        source: S,
        config: &ResolverConfig,
        clock: Arc<dyn Clock>,
    ) -> LiveResult<Self> {
        config.validate()?;

        let mut builder = Self::builder(source).clock(clock);
        if config.retry_enabled {
            builder = builder.retry(config.backoff_policy.clone());
        }
        if config.cache_enabled {
            builder = builder.cache_policy(config.cache_policy.clone());
        }
        Ok(builder.build())
    }

    /// Resolver-unique cache key, generated once at construction.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn retry_policy(&self) -> Option<&BackoffPolicy> {
        self.retry_policy.as_ref()
    }

    pub fn cache(&self) -> Option<&SharedCache> {
        self.cache.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Produce the current value.
    ///
    /// Cache misses are recovered transparently by fetching; fetch and retry
    /// failures surface as [`ResolutionError`] and nothing stale is
    /// substituted.
    pub fn resolve(&self) -> LiveResult<LiveValue> {
        let Some(cache) = &self.cache else {
            return Ok(self.fetch()?);
        };

        match cache.lock()?.get(&self.cache_key) {
            Ok(value) => {
                tracing::debug!(cache = %cache.name(), source = %self.source.name(), "Cache hit");
                return Ok(value);
            }
            Err(CacheError::MissingKey { .. }) => {
                tracing::debug!(cache = %cache.name(), source = %self.source.name(), "Cache miss");
            }
            Err(err) => return Err(err.into()),
        }

        let value = self.fetch()?;
        cache.lock()?.set(self.cache_key.clone(), value.clone());
        Ok(value)
    }

    fn fetch(&self) -> Result<LiveValue, ResolutionError> {
        match &self.retry_policy {
            Some(policy) => Ok(retry(policy, self.clock.as_ref(), || {
                self.source.fetch_value()
            })?),
            None => Ok(self.source.fetch_value()?),
        }
    }
}

impl<S: LiveStateSource> StateResolver for LiveResolver<S> {
    fn resolve(&self) -> LiveResult<LiveValue> {
        LiveResolver::resolve(self)
    }
}

impl<S: LiveStateSource> std::fmt::Debug for LiveResolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveResolver")
            .field("source", &self.source.name())
            .field("retry_policy", &self.retry_policy)
            .field("cache", &self.cache.as_ref().map(SharedCache::name))
            .field("cache_key", &self.cache_key)
            .finish()
    }
}

/// Builder for [`LiveResolver`].
pub struct LiveResolverBuilder<S> {
    source: S,
    retry_policy: Option<BackoffPolicy>,
    cache: Option<SharedCache>,
    cache_policy: Option<CachePolicy>,
    clock: Arc<dyn Clock>,
}

impl<S: LiveStateSource> LiveResolverBuilder<S> {
    fn new(source: S) -> Self {
        Self {
            source,
            retry_policy: None,
            cache: None,
            cache_policy: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Enable retries under `policy`.
    pub fn retry(mut self, policy: BackoffPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Use an existing, possibly shared, cache.
    pub fn cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Construct a private cache for this resolver. Ignored if `cache` is set.
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    /// Clock used for retry sleeps and for a cache built from `cache_policy`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> LiveResolver<S> {
        let cache = self.cache.or_else(|| {
            self.cache_policy.map(|policy| {
                SharedCache::new(Cache::new(strategy_for(&policy, self.clock.clone())))
            })
        });

        LiveResolver {
            source: self.source,
            retry_policy: self.retry_policy,
            cache,
            cache_key: Uuid::now_v7().to_string(),
            clock: self.clock,
        }
    }
}
