//! livecfg Core - Contracts for live configuration values
//!
//! Pure data and small algorithms shared by every other crate:
//! - Error taxonomy and the `LiveResult` alias
//! - `BackoffPolicy` and the blocking retry loop
//! - `Clock` (system and manual) for TTL expiry and retry sleeps
//! - Canonical content hashing used for change detection
//! - Collaborator traits: `LiveStateSource`, `StateResolver`, `Validator`
//! - `ResolverConfig` / `CachePolicy` construction options

pub mod backoff;
pub mod clock;
pub mod config;
pub mod error;
pub mod hash;
pub mod traits;

/// Raw value of a configuration attribute.
///
/// Nested structures are plain JSON trees, so a resolved value is always
/// fully resolved.
pub type LiveValue = serde_json::Value;

pub use backoff::{retry, retry_with_rng, BackoffPolicy, JITTER_MAX, JITTER_MIN};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CachePolicy, ResolverConfig, DEFAULT_USAGE_CAPACITY};
pub use error::{
    CacheError, ConfigError, FetchError, ListenerError, LiveError, LiveResult, ResolutionError,
    RetryExhausted, RetryExhaustedError, TreeError, ValidationError,
};
pub use hash::{canonical_json, state_hash, StateHash};
pub use traits::{LiveStateSource, PredicateValidator, StateResolver, Validator};
