//! Configuration types

use crate::backoff::BackoffPolicy;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of the preset usage-based policies.
pub const DEFAULT_USAGE_CAPACITY: usize = 100;

/// Eviction policy for a resolver's cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachePolicy {
    /// Entries expire `seconds` after insertion
    Ttl { seconds: u64 },
    /// Capacity-bounded, evicts the least recently used key
    Lru { capacity: usize },
    /// Capacity-bounded, evicts the most recently used key
    Mru { capacity: usize },
}

impl CachePolicy {
    pub fn ttl(duration: Duration) -> Self {
        Self::Ttl {
            seconds: duration.as_secs(),
        }
    }

    pub fn ten_minute_ttl() -> Self {
        Self::Ttl { seconds: 60 * 10 }
    }

    pub fn one_hour_ttl() -> Self {
        Self::Ttl { seconds: 60 * 60 }
    }

    pub fn daily_ttl() -> Self {
        Self::Ttl {
            seconds: 60 * 60 * 24,
        }
    }

    pub fn default_lru() -> Self {
        Self::Lru {
            capacity: DEFAULT_USAGE_CAPACITY,
        }
    }

    pub fn default_mru() -> Self {
        Self::Mru {
            capacity: DEFAULT_USAGE_CAPACITY,
        }
    }

    /// Validate the policy parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Ttl { seconds } if *seconds == 0 => Err(ConfigError::InvalidValue {
                field: "cache_policy.seconds".to_string(),
                value: seconds.to_string(),
                reason: "ttl must be positive".to_string(),
            }),
            Self::Lru { capacity } | Self::Mru { capacity } if *capacity == 0 => {
                Err(ConfigError::InvalidValue {
                    field: "cache_policy.capacity".to_string(),
                    value: capacity.to_string(),
                    reason: "capacity must be greater than 0".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::ten_minute_ttl()
    }
}

/// Construction-time options for a live resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResolverConfig {
    /// Wrap every fetch in the retry loop
    pub retry_enabled: bool,
    /// Policy used when `retry_enabled`
    pub backoff_policy: BackoffPolicy,
    /// Memoize fetched values
    pub cache_enabled: bool,
    /// Policy for the auto-constructed cache when `cache_enabled`
    pub cache_policy: CachePolicy,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable retries.
    pub fn with_retry(mut self, enabled: bool) -> Self {
        self.retry_enabled = enabled;
        self
    }

    /// Set the backoff policy. Does not enable retries by itself.
    pub fn with_backoff_policy(mut self, policy: BackoffPolicy) -> Self {
        self.backoff_policy = policy;
        self
    }

    /// Enable or disable caching.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the cache policy. Does not enable caching by itself.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Validate the configuration.
    ///
    /// The backoff policy is validated at construction, so only the cache
    /// policy needs checking here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_enabled {
            self.cache_policy.validate()?;
        }
        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `LIVECFG_RETRY_ENABLED`: Enable retries (default: false)
    /// - `LIVECFG_RETRY_MAX_RETRIES`: Maximum attempts (default: 6)
    /// - `LIVECFG_RETRY_BASE_DELAY_MS`: Base delay in ms (default: 500)
    /// - `LIVECFG_RETRY_MAX_DELAY_MS`: Maximum delay in ms (default: 32000)
    /// - `LIVECFG_RETRY_FACTOR`: Growth factor (default: 2.0)
    /// - `LIVECFG_RETRY_JITTER`: Apply jitter (default: true)
    /// - `LIVECFG_CACHE_ENABLED`: Enable caching (default: false)
    /// - `LIVECFG_CACHE_TTL_SECS`: TTL of the default cache (default: 600)
    ///
    /// Returns an error when the resulting backoff policy is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ResolverConfig::from_env`], reading from an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let policy = &defaults.backoff_policy;

        let parse_bool = |s: String| match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        };

        let backoff_policy = BackoffPolicy::new(
            lookup("LIVECFG_RETRY_MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(policy.max_retries()),
            lookup("LIVECFG_RETRY_BASE_DELAY_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(policy.base_delay()),
            lookup("LIVECFG_RETRY_MAX_DELAY_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(policy.max_delay()),
            lookup("LIVECFG_RETRY_FACTOR")
                .and_then(|s| s.parse().ok())
                .unwrap_or(policy.growth_factor()),
            lookup("LIVECFG_RETRY_JITTER")
                .and_then(parse_bool)
                .unwrap_or(policy.jitter()),
        )?;

        let cache_policy = lookup("LIVECFG_CACHE_TTL_SECS")
            .and_then(|s| s.parse().ok())
            .map(|seconds| CachePolicy::Ttl { seconds })
            .unwrap_or(defaults.cache_policy);

        let config = Self {
            retry_enabled: lookup("LIVECFG_RETRY_ENABLED")
                .and_then(parse_bool)
                .unwrap_or(defaults.retry_enabled),
            backoff_policy,
            cache_enabled: lookup("LIVECFG_CACHE_ENABLED")
                .and_then(parse_bool)
                .unwrap_or(defaults.cache_enabled),
            cache_policy,
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert!(!config.retry_enabled);
        assert!(!config.cache_enabled);
        assert_eq!(config.backoff_policy, BackoffPolicy::default());
        assert_eq!(config.cache_policy, CachePolicy::Ttl { seconds: 600 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = ResolverConfig::new()
            .with_retry(true)
            .with_cache(true)
            .with_cache_policy(CachePolicy::default_lru());

        assert!(config.retry_enabled);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_policy, CachePolicy::Lru { capacity: 100 });
    }

    #[test]
    fn test_validate_rejects_zero_capacity_when_enabled() {
        let config = ResolverConfig::new()
            .with_cache(true)
            .with_cache_policy(CachePolicy::Mru { capacity: 0 });
        assert!(config.validate().is_err());

        let disabled = config.with_cache(false);
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert_eq!(CachePolicy::one_hour_ttl(), CachePolicy::Ttl { seconds: 3600 });
        assert_eq!(CachePolicy::daily_ttl(), CachePolicy::Ttl { seconds: 86400 });
        assert_eq!(CachePolicy::default_mru(), CachePolicy::Mru { capacity: 100 });
        assert_eq!(
            CachePolicy::ttl(Duration::from_secs(30)),
            CachePolicy::Ttl { seconds: 30 }
        );
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ResolverConfig::from_lookup(lookup_from(&[
            ("LIVECFG_RETRY_ENABLED", "true"),
            ("LIVECFG_RETRY_MAX_RETRIES", "3"),
            ("LIVECFG_RETRY_BASE_DELAY_MS", "100"),
            ("LIVECFG_RETRY_MAX_DELAY_MS", "1000"),
            ("LIVECFG_RETRY_FACTOR", "3"),
            ("LIVECFG_RETRY_JITTER", "false"),
            ("LIVECFG_CACHE_ENABLED", "1"),
            ("LIVECFG_CACHE_TTL_SECS", "42"),
        ]))
        .unwrap();

        assert!(config.retry_enabled);
        assert!(config.cache_enabled);
        assert_eq!(config.backoff_policy.max_retries(), 3);
        assert_eq!(config.backoff_policy.base_delay(), Duration::from_millis(100));
        assert_eq!(config.backoff_policy.max_delay(), Duration::from_secs(1));
        assert_eq!(config.backoff_policy.growth_factor(), 3.0);
        assert!(!config.backoff_policy.jitter());
        assert_eq!(config.cache_policy, CachePolicy::Ttl { seconds: 42 });
    }

    #[test]
    fn test_from_lookup_falls_back_on_garbage() {
        let config = ResolverConfig::from_lookup(lookup_from(&[
            ("LIVECFG_RETRY_ENABLED", "maybe"),
            ("LIVECFG_RETRY_MAX_RETRIES", "many"),
        ]))
        .unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_invalid_policy() {
        let result = ResolverConfig::from_lookup(lookup_from(&[("LIVECFG_RETRY_FACTOR", "0.5")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_cache_policy_serde_tagged() {
        let json = serde_json::to_value(CachePolicy::Lru { capacity: 5 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "lru", "capacity": 5}));
    }
}
