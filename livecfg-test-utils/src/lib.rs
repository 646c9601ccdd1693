//! livecfg Test Utilities
//!
//! Centralized test infrastructure for the livecfg workspace:
//! - Scripted and flaky sources that count their fetches
//! - Recording listeners and counting validators
//! - Proptest generators for values and policies
//! - Fixtures for common tree and policy setups

// Re-export core types for convenience
pub use livecfg_core::{
    canonical_json, retry, retry_with_rng, state_hash, BackoffPolicy, CacheError, CachePolicy,
    Clock, FetchError, ListenerError, LiveError, LiveResult, LiveStateSource, LiveValue,
    ManualClock, PredicateValidator, ResolutionError, ResolverConfig, RetryExhaustedError,
    StateHash, StateResolver, SystemClock, TreeError, ValidationError, Validator,
};
pub use livecfg_events::{
    ChangeEvent, ChangeGate, ConfigTree, GateOutcome, GateState, Listener, LiveItem, NodeId,
    PropagationReport, StaticItem,
};
pub use livecfg_storage::{
    strategy_for, Cache, CacheRegistry, CacheStats, EntryMetadata, EvictionStrategy,
    LiveResolver, LruStrategy, MruStrategy, SharedCache, TtlStrategy,
};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// MOCK SOURCES
// ============================================================================

/// Source replaying a fixed script of results.
///
/// Once the script is exhausted the final entry repeats. Clones share the
/// script and the call counter.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Result<LiveValue, FetchError>>>>,
    last: Arc<Mutex<Result<LiveValue, FetchError>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<LiveValue, FetchError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            last: Arc::new(Mutex::new(Err(FetchError::unavailable(
                "scripted",
                "empty script",
            )))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Source returning `values` in order, then repeating the last one.
    pub fn values(values: impl IntoIterator<Item = LiveValue>) -> Self {
        Self::new(values.into_iter().map(Ok))
    }

    /// Append more results to the script.
    pub fn push(&self, result: Result<LiveValue, FetchError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(result);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LiveStateSource for ScriptedSource {
    fn fetch_value(&self) -> Result<LiveValue, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .map_err(|_| FetchError::unavailable("scripted", "script lock poisoned"))?
            .pop_front();
        let mut last = self
            .last
            .lock()
            .map_err(|_| FetchError::unavailable("scripted", "script lock poisoned"))?;
        if let Some(result) = next {
            *last = result;
        }
        last.clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Source failing its first `failures` fetches, then returning `value`.
#[derive(Debug, Clone)]
pub struct FlakySource {
    failures: usize,
    value: LiveValue,
    calls: Arc<AtomicUsize>,
}

impl FlakySource {
    pub fn new(failures: usize, value: LiveValue) -> Self {
        Self {
            failures,
            value,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LiveStateSource for FlakySource {
    fn fetch_value(&self) -> Result<LiveValue, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(FetchError::unavailable(
                "flaky",
                format!("failure {} of {}", call + 1, self.failures),
            ))
        } else {
            Ok(self.value.clone())
        }
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

// ============================================================================
// LISTENERS AND VALIDATORS
// ============================================================================

/// Shared log of labelled change events.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    log: Arc<Mutex<Vec<(String, ChangeEvent)>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener appending `(label, event)` to this log.
    pub fn listener(&self, label: impl Into<String>) -> Listener {
        let log = self.log.clone();
        let label = label.into();
        Arc::new(move |event: &ChangeEvent| -> Result<(), ListenerError> {
            log.lock()
                .map_err(|_| ListenerError::failed("recording log poisoned"))?
                .push((label.clone(), event.clone()));
            Ok(())
        })
    }

    /// Labels in delivery order.
    pub fn labels(&self) -> Vec<String> {
        self.entries().into_iter().map(|(label, _)| label).collect()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.entries().into_iter().map(|(_, event)| event).collect()
    }

    pub fn entries(&self) -> Vec<(String, ChangeEvent)> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.log.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validator counting its invocations. Clones share the counter.
#[derive(Clone)]
pub struct CountingValidator {
    calls: Arc<AtomicUsize>,
    accept: Arc<dyn Fn(&LiveValue) -> bool + Send + Sync>,
    message: String,
    immediate: bool,
}

impl CountingValidator {
    /// Validator accepting every value.
    pub fn accepting() -> Self {
        Self::new("never fails", |_| true)
    }

    pub fn new<F>(message: impl Into<String>, accept: F) -> Self
    where
        F: Fn(&LiveValue) -> bool + Send + Sync + 'static,
    {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            accept: Arc::new(accept),
            message: message.into(),
            immediate: true,
        }
    }

    pub fn deferred(mut self) -> Self {
        self.immediate = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn boxed(&self) -> Box<dyn Validator> {
        Box::new(self.clone())
    }
}

impl Validator for CountingValidator {
    fn validate(&self, value: &LiveValue) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.accept)(value)
    }

    fn error_message(&self) -> String {
        self.message.clone()
    }

    fn validate_immediately(&self) -> bool {
        self.immediate
    }
}

impl std::fmt::Debug for CountingValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingValidator")
            .field("calls", &self.calls())
            .field("message", &self.message)
            .finish()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for livecfg values and policies.

    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    /// Generate a JSON scalar.
    pub fn arb_scalar() -> impl Strategy<Value = LiveValue> {
        prop_oneof![
            Just(LiveValue::Null),
            any::<bool>().prop_map(LiveValue::from),
            any::<i64>().prop_map(LiveValue::from),
            "[a-z0-9 ]{0,12}".prop_map(LiveValue::from),
        ]
    }

    /// Generate a JSON value up to three levels deep.
    pub fn arb_live_value() -> impl Strategy<Value = LiveValue> {
        arb_scalar().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(LiveValue::from),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|map| {
                    LiveValue::Object(map.into_iter().collect())
                }),
            ]
        })
    }

    /// Generate a valid backoff policy with millisecond-scale delays.
    pub fn arb_backoff_policy() -> impl Strategy<Value = BackoffPolicy> {
        (1u32..10, 0u64..500, 0u64..5000, 1.1f64..4.0, any::<bool>()).prop_filter_map(
            "max_delay must cover base_delay",
            |(max_retries, base_ms, extra_ms, factor, jitter)| {
                BackoffPolicy::new(
                    max_retries,
                    Duration::from_millis(base_ms),
                    Duration::from_millis(base_ms + extra_ms),
                    factor,
                    jitter,
                )
                .ok()
            },
        )
    }

    /// Generate a valid cache policy.
    pub fn arb_cache_policy() -> impl Strategy<Value = CachePolicy> {
        prop_oneof![
            (1u64..86_400).prop_map(|seconds| CachePolicy::Ttl { seconds }),
            (1usize..64).prop_map(|capacity| CachePolicy::Lru { capacity }),
            (1usize..64).prop_map(|capacity| CachePolicy::Mru { capacity }),
        ]
    }

    /// Generate a sequence of keys drawn from a small alphabet so repeats occur.
    pub fn arb_key_sequence(max_len: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-f]", 0..max_len)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    /// 2024-01-01T00:00:00Z, a fixed start for manual clocks.
    pub fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_else(Utc::now)
    }

    /// Manual clock starting at [`epoch`].
    pub fn manual_clock() -> ManualClock {
        ManualClock::new(epoch())
    }

    /// Policy with small deterministic delays: 10ms base, 80ms cap, no jitter.
    pub fn fast_backoff_policy(max_retries: u32) -> BackoffPolicy {
        BackoffPolicy::new(
            max_retries,
            Duration::from_millis(10),
            Duration::from_millis(80),
            2.0,
            false,
        )
        .unwrap_or_default()
    }

    /// Nodes of a `root → mid → leaf` tree.
    #[derive(Debug, Clone, Copy)]
    pub struct ThreeLevels {
        pub root: NodeId,
        pub mid: NodeId,
        pub leaf: NodeId,
    }

    /// A `root → mid → leaf` tree on `clock`.
    pub fn three_level_tree(clock: Arc<dyn Clock>) -> (ConfigTree, ThreeLevels) {
        let mut tree = ConfigTree::with_clock(clock);
        let root = tree.root();
        let mid = tree.add_node(root, "mid").unwrap_or(root);
        let leaf = tree.add_node(mid, "leaf").unwrap_or(mid);
        (tree, ThreeLevels { root, mid, leaf })
    }
}
