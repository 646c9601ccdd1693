//! Time-to-live eviction.

use chrono::{DateTime, Utc};
use livecfg_core::{Clock, LiveValue, SystemClock};
use std::sync::Arc;
use std::time::Duration;

use super::traits::{EntryMetadata, EvictionStrategy, MetadataMap};

/// Entries expire a fixed duration after insertion.
///
/// There is no capacity bound and no eviction on insertion; stale entries
/// are purged lazily by the next read that finds them.
#[derive(Debug, Clone)]
pub struct TtlStrategy {
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlStrategy {
    /// TTL strategy on the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, clock }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn expiry_from_now(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl EvictionStrategy for TtlStrategy {
    fn kind(&self) -> &'static str {
        "ttl"
    }

    fn is_valid(&self, meta: Option<&EntryMetadata>) -> bool {
        match meta {
            Some(EntryMetadata::ExpiresAt(expires_at)) => self.clock.now() < *expires_at,
            _ => false,
        }
    }

    fn on_insertion(
        &mut self,
        key: &str,
        _value: &LiveValue,
        meta: &mut MetadataMap,
    ) -> Vec<String> {
        meta.insert(key.to_string(), EntryMetadata::ExpiresAt(self.expiry_from_now()));
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecfg_core::ManualClock;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_insertion_records_expiry() {
        let clock = ManualClock::starting_now();
        let t0 = clock.now();
        let mut strategy = TtlStrategy::with_clock(Duration::from_secs(10), Arc::new(clock));
        let mut meta = MetadataMap::new();

        let evicted = strategy.on_insertion("k", &json!(1), &mut meta);

        assert!(evicted.is_empty());
        assert_eq!(
            meta.get("k"),
            Some(&EntryMetadata::ExpiresAt(t0 + chrono::Duration::seconds(10)))
        );
    }

    #[test]
    fn test_missing_or_foreign_metadata_is_invalid() {
        let strategy = TtlStrategy::new(Duration::from_secs(60));
        assert!(!strategy.is_valid(None));
        assert!(!strategy.is_valid(Some(&EntryMetadata::Tracked)));
    }

    #[test]
    fn test_expiry_instant_itself_is_invalid() {
        let clock = ManualClock::starting_now();
        let mut strategy =
            TtlStrategy::with_clock(Duration::from_secs(5), Arc::new(clock.clone()));
        let mut meta = MetadataMap::new();
        strategy.on_insertion("k", &json!(1), &mut meta);

        clock.advance(Duration::from_secs(5));
        assert!(!strategy.is_valid(meta.get("k")));
    }

    proptest! {
        #[test]
        fn prop_valid_before_expiry_invalid_after(seconds in 1u64..100_000, eps_ms in 1u64..1000) {
            let clock = ManualClock::starting_now();
            let mut strategy =
                TtlStrategy::with_clock(Duration::from_secs(seconds), Arc::new(clock.clone()));
            let mut meta = MetadataMap::new();
            strategy.on_insertion("k", &json!("v"), &mut meta);

            let eps = Duration::from_millis(eps_ms);
            clock.advance(Duration::from_secs(seconds) - eps);
            prop_assert!(strategy.is_valid(meta.get("k")));

            clock.advance(eps * 2);
            prop_assert!(!strategy.is_valid(meta.get("k")));
        }
    }
}
