//! Collaborator contracts consumed by the live-value pipeline.
//!
//! Concrete sources (files, environment, HTTP, cloud APIs) and concrete
//! validation rules live outside this workspace. The pipeline only needs
//! the capabilities below.

use crate::error::{FetchError, LiveResult};
use crate::LiveValue;
use std::fmt;

/// Produces the current raw value of a live attribute, or fails.
///
/// No idempotency is assumed: the resolver may call `fetch_value` several
/// times per resolution when retry is enabled.
pub trait LiveStateSource: Send + Sync {
    /// Fetch the current raw value.
    fn fetch_value(&self) -> Result<LiveValue, FetchError>;

    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        "live-source"
    }
}

impl<F> LiveStateSource for F
where
    F: Fn() -> Result<LiveValue, FetchError> + Send + Sync,
{
    fn fetch_value(&self) -> Result<LiveValue, FetchError> {
        self()
    }

    fn name(&self) -> &str {
        "callable"
    }
}

/// Anything that can resolve the current value of a live attribute.
///
/// `LiveResolver` in `livecfg-storage` is the production implementation;
/// the change gate only depends on this trait.
pub trait StateResolver {
    fn resolve(&self) -> LiveResult<LiveValue>;
}

impl<R: StateResolver + ?Sized> StateResolver for Box<R> {
    fn resolve(&self) -> LiveResult<LiveValue> {
        (**self).resolve()
    }
}

/// A validation rule attached to a live attribute.
pub trait Validator: Send + Sync {
    /// Return true when `value` passes the rule.
    fn validate(&self, value: &LiveValue) -> bool;

    /// Message reported when `validate` returns false.
    fn error_message(&self) -> String;

    /// Whether attaching this validator forces an immediate evaluation.
    fn validate_immediately(&self) -> bool {
        true
    }
}

/// Adapts a predicate and a message into a [`Validator`].
pub struct PredicateValidator<F> {
    predicate: F,
    message: String,
    validate_immediately: bool,
}

impl<F> PredicateValidator<F>
where
    F: Fn(&LiveValue) -> bool + Send + Sync,
{
    pub fn new(message: impl Into<String>, predicate: F) -> Self {
        Self {
            predicate,
            message: message.into(),
            validate_immediately: true,
        }
    }

    /// Defer validation until the next read instead of running it on attach.
    pub fn deferred(mut self) -> Self {
        self.validate_immediately = false;
        self
    }
}

impl<F> Validator for PredicateValidator<F>
where
    F: Fn(&LiveValue) -> bool + Send + Sync,
{
    fn validate(&self, value: &LiveValue) -> bool {
        (self.predicate)(value)
    }

    fn error_message(&self) -> String {
        self.message.clone()
    }

    fn validate_immediately(&self) -> bool {
        self.validate_immediately
    }
}

impl<F> fmt::Debug for PredicateValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateValidator")
            .field("message", &self.message)
            .field("validate_immediately", &self.validate_immediately)
            .finish()
    }
}
