//! Error types for livecfg operations

use crate::backoff::BackoffPolicy;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a live state source.
///
/// Opaque to the pipeline: it only signals that the fetch should be retried
/// (when retry is enabled) or surfaced to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Source {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("Source {source_name} returned an invalid payload: {reason}")]
    InvalidPayload { source_name: String, reason: String },
}

impl FetchError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_payload(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Terminal failure of the retry loop, wrapping the last error seen.
#[derive(Debug, Clone, Error)]
#[error("Retries exhausted after {attempts} attempts ({total_slept:?} slept): {last_error}")]
pub struct RetryExhausted<E> {
    /// The policy that governed the attempts.
    pub policy: BackoffPolicy,
    /// Number of times the operation was invoked.
    pub attempts: u32,
    /// Sum of every delay slept between attempts.
    pub total_slept: Duration,
    /// Error returned by the final attempt.
    #[source]
    pub last_error: E,
}

/// Retry exhaustion for live source fetches.
pub type RetryExhaustedError = RetryExhausted<FetchError>;

/// Failure of `LiveResolver::resolve`.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    RetryExhausted(#[from] RetryExhaustedError),
}

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache key not found: {key}")]
    MissingKey { key: String },

    #[error("Cache with name {name} already exists. Cache names must be unique per registry")]
    DuplicateName { name: String },

    #[error("No cache registered under name {name}")]
    UnknownCache { name: String },

    #[error("Cache lock poisoned: {name}")]
    LockPoisoned { name: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Validation failed: {message}")]
    Failed { message: String },
}

/// Node hierarchy errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("Unknown node: {id}")]
    UnknownNode { id: usize },

    #[error("Attaching node {node} under {parent} would create a cycle")]
    CycleDetected { node: usize, parent: usize },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Failure returned by a change listener.
///
/// Never re-raised: the propagator reports it and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListenerError {
    #[error("Listener failed: {reason}")]
    Failed { reason: String },
}

impl ListenerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Master error type for all livecfg errors.
#[derive(Debug, Clone, Error)]
pub enum LiveError {
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<FetchError> for LiveError {
    fn from(err: FetchError) -> Self {
        Self::Resolution(ResolutionError::Fetch(err))
    }
}

impl From<RetryExhaustedError> for LiveError {
    fn from(err: RetryExhaustedError) -> Self {
        Self::Resolution(ResolutionError::RetryExhausted(err))
    }
}

/// Result type alias for livecfg operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// TESTS
// =============================================================================
