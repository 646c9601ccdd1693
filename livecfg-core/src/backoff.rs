//! Exponential backoff policy and the blocking retry loop.
//!
//! The policy is pure data. [`retry`] drives a fallible operation through it:
//! attempts are strictly sequential, and between failures the calling thread
//! sleeps on the injected [`Clock`] for `min(max_delay, base_delay * factor^i)`,
//! optionally scaled by a uniform jitter factor in `[0.5, 1.0]`.

use crate::clock::Clock;
use crate::error::{ConfigError, RetryExhausted};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lower bound of the jitter scale applied to a computed delay.
pub const JITTER_MIN: f64 = 0.5;
/// Upper bound of the jitter scale applied to a computed delay.
pub const JITTER_MAX: f64 = 1.0;

/// Parameters governing retry count and inter-attempt delay growth.
///
/// Immutable once constructed; every constructor (including serde
/// deserialization) goes through [`BackoffPolicy::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BackoffPolicySpec", into = "BackoffPolicySpec")]
pub struct BackoffPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    growth_factor: f64,
    jitter: bool,
}

impl BackoffPolicy {
    /// Build a validated policy.
    ///
    /// Validates:
    /// - max_retries > 0
    /// - max_delay >= base_delay
    /// - growth_factor > 1 and finite
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        growth_factor: f64,
        jitter: bool,
    ) -> Result<Self, ConfigError> {
        if max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_retries".to_string(),
                value: max_retries.to_string(),
                reason: "max_retries must be greater than 0".to_string(),
            });
        }

        if max_delay < base_delay {
            return Err(ConfigError::InvalidValue {
                field: "max_delay".to_string(),
                value: format!("{:?}", max_delay),
                reason: format!("max_delay must be at least base_delay ({:?})", base_delay),
            });
        }

        if !growth_factor.is_finite() || growth_factor <= 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "growth_factor".to_string(),
                value: growth_factor.to_string(),
                reason: "growth_factor must be a finite number greater than 1".to_string(),
            });
        }

        Ok(Self {
            max_retries,
            base_delay,
            max_delay,
            growth_factor,
            jitter,
        })
    }

    /// Maximum number of attempts, including the first one.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Pre-jitter delay slept after the failure of attempt `attempt` (zero-based).
    ///
    /// Never exceeds `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.growth_factor.powi(exponent);

        // Compared as Durations: max_delay may exceed what f64 seconds round-trip.
        match Duration::try_from_secs_f64(secs) {
            Ok(delay) => delay.min(self.max_delay),
            Err(_) => self.max_delay,
        }
    }
}

impl Default for BackoffPolicy {
    /// 6 attempts, 0.5s base delay, 32s cap, doubling, with jitter.
    fn default() -> Self {
        Self {
            max_retries: 6,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(32),
            growth_factor: 2.0,
            jitter: true,
        }
    }
}

/// Serialized form of [`BackoffPolicy`], delays in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackoffPolicySpec {
    max_retries: u32,
    base_delay_secs: f64,
    max_delay_secs: f64,
    growth_factor: f64,
    jitter: bool,
}

impl TryFrom<BackoffPolicySpec> for BackoffPolicy {
    type Error = ConfigError;

    fn try_from(spec: BackoffPolicySpec) -> Result<Self, Self::Error> {
        let base_delay = seconds_field("base_delay_secs", spec.base_delay_secs)?;
        let max_delay = seconds_field("max_delay_secs", spec.max_delay_secs)?;
        BackoffPolicy::new(
            spec.max_retries,
            base_delay,
            max_delay,
            spec.growth_factor,
            spec.jitter,
        )
    }
}

impl From<BackoffPolicy> for BackoffPolicySpec {
    fn from(policy: BackoffPolicy) -> Self {
        Self {
            max_retries: policy.max_retries,
            base_delay_secs: policy.base_delay.as_secs_f64(),
            max_delay_secs: policy.max_delay.as_secs_f64(),
            growth_factor: policy.growth_factor,
            jitter: policy.jitter,
        }
    }
}

fn seconds_field(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: secs.to_string(),
        reason: "must be a finite, non-negative number of seconds".to_string(),
    })
}

/// Run `operation` under `policy`, sleeping on `clock` between failures.
///
/// Returns the first success, or [`RetryExhausted`] carrying the last error
/// once `max_retries` attempts have failed. Jitter is drawn from the
/// thread-local RNG.
pub fn retry<T, E, F>(
    policy: &BackoffPolicy,
    clock: &dyn Clock,
    operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Result<T, E>,
    E: fmt::Display,
{
    retry_with_rng(policy, clock, &mut rand::thread_rng(), operation)
}

/// [`retry`] with an explicit jitter source.
pub fn retry_with_rng<T, E, F, R>(
    policy: &BackoffPolicy,
    clock: &dyn Clock,
    rng: &mut R,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Result<T, E>,
    E: fmt::Display,
    R: Rng + ?Sized,
{
    let mut attempt: u32 = 0;
    let mut total_slept = Duration::ZERO;

    loop {
        let err = match operation() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        attempt += 1;
        if attempt >= policy.max_retries {
            tracing::error!(
                attempts = attempt,
                total_slept_ms = total_slept.as_millis() as u64,
                error = %err,
                "Retries exhausted"
            );
            return Err(RetryExhausted {
                policy: policy.clone(),
                attempts: attempt,
                total_slept,
                last_error: err,
            });
        }

        let mut delay = policy.delay_for_attempt(attempt - 1);
        if policy.jitter {
            let scaled = delay.as_secs_f64() * rng.gen_range(JITTER_MIN..=JITTER_MAX);
            delay = Duration::try_from_secs_f64(scaled).map_or(delay, |d| d.min(delay));
        }

        tracing::warn!(
            attempt,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, backing off"
        );

        clock.sleep(delay);
        total_slept = total_slept.saturating_add(delay);
    }
}
