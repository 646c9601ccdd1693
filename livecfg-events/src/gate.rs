//! Hash-gated validation and change detection.
//!
//! The gate remembers the content hash and raw value of the last accepted
//! observation. A new observation with the same hash is passed through
//! untouched: validators are not re-run and no change is reported. Any
//! other observation is validated first and only becomes the new baseline
//! once every validator accepts it.

use livecfg_core::{state_hash, LiveValue, StateHash, ValidationError, Validator};

/// Observation state of a [`ChangeGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Unobserved,
    Observed(StateHash),
}

/// Result of passing one value through the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    /// The observed value, returned unchanged
    pub value: LiveValue,
    /// Content hash of `value`
    pub hash: StateHash,
    /// Whether validators ran for this observation
    pub validated: bool,
    /// `(old, new)` when a previous baseline existed and differs from `value`
    pub change: Option<(LiveValue, LiveValue)>,
}

struct Baseline {
    hash: StateHash,
    value: LiveValue,
}

/// Validators plus the last accepted observation.
#[derive(Default)]
pub struct ChangeGate {
    baseline: Option<Baseline>,
    validators: Vec<Box<dyn Validator>>,
}

impl ChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        match &self.baseline {
            Some(baseline) => GateState::Observed(baseline.hash.clone()),
            None => GateState::Unobserved,
        }
    }

    /// Raw value of the last accepted observation.
    pub fn last_value(&self) -> Option<&LiveValue> {
        self.baseline.as_ref().map(|b| &b.value)
    }

    /// Attach a validator. Returns whether it asks for immediate validation.
    pub fn add_validator(&mut self, validator: Box<dyn Validator>) -> bool {
        let immediate = validator.validate_immediately();
        self.validators.push(validator);
        immediate
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    /// Pass `value` through the gate and accept it as the new baseline.
    ///
    /// Equivalent to [`inspect`](Self::inspect) followed by
    /// [`commit`](Self::commit).
    pub fn observe(&mut self, value: LiveValue, force: bool) -> Result<GateOutcome, ValidationError> {
        let outcome = self.inspect(value, force)?;
        self.commit(&outcome);
        Ok(outcome)
    }

    /// Decide what `value` means for the gate without changing it.
    ///
    /// Validation runs when nothing has been observed yet, when `force` is
    /// set, or when the content hash differs from the baseline. The first
    /// failing validator's message becomes the error. A failed inspection
    /// leaves nothing to commit, so the same content is validated again
    /// next time.
    pub fn inspect(&self, value: LiveValue, force: bool) -> Result<GateOutcome, ValidationError> {
        let hash = state_hash(&value);
        let unchanged = self
            .baseline
            .as_ref()
            .is_some_and(|baseline| baseline.hash == hash);

        if unchanged && !force {
            tracing::trace!(hash = %hash, "Value unchanged, skipping validation");
            return Ok(GateOutcome {
                value,
                hash,
                validated: false,
                change: None,
            });
        }

        if let Some(failed) = self.validators.iter().find(|v| !v.validate(&value)) {
            let message = failed.error_message();
            tracing::debug!(hash = %hash, message = %message, "Validation failed");
            return Err(ValidationError::Failed { message });
        }

        let change = match &self.baseline {
            Some(previous) if previous.value != value => {
                Some((previous.value.clone(), value.clone()))
            }
            _ => None,
        };

        tracing::debug!(
            hash = %hash,
            forced = force,
            changed = change.is_some(),
            "Validated observation"
        );

        Ok(GateOutcome {
            value,
            hash,
            validated: true,
            change,
        })
    }

    /// Make a validated outcome the new baseline. Unvalidated outcomes are
    /// already the baseline and are ignored.
    pub fn commit(&mut self, outcome: &GateOutcome) {
        if outcome.validated {
            self.baseline = Some(Baseline {
                hash: outcome.hash.clone(),
                value: outcome.value.clone(),
            });
        }
    }

    /// Forget the baseline. The next observation is treated as the first.
    pub fn reset(&mut self) {
        self.baseline = None;
    }
}

impl std::fmt::Debug for ChangeGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeGate")
            .field("state", &self.state())
            .field("validators", &self.validators.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecfg_core::PredicateValidator;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_validator(
        calls: &Arc<AtomicUsize>,
        accept: fn(&LiveValue) -> bool,
    ) -> Box<dyn Validator> {
        let calls = calls.clone();
        Box::new(PredicateValidator::new("rejected", move |v: &LiveValue| {
            calls.fetch_add(1, Ordering::SeqCst);
            accept(v)
        }))
    }

    #[test]
    fn test_first_observation_validates_without_change() {
        let mut gate = ChangeGate::new();
        assert_eq!(gate.state(), GateState::Unobserved);

        let outcome = gate.observe(json!(1), false).unwrap();

        assert!(outcome.validated);
        assert!(outcome.change.is_none());
        assert_eq!(gate.state(), GateState::Observed(state_hash(&json!(1))));
        assert_eq!(gate.last_value(), Some(&json!(1)));
    }

    #[test]
    fn test_unchanged_value_skips_validators() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut gate = ChangeGate::new();
        gate.add_validator(counting_validator(&calls, |_| true));

        gate.observe(json!({"a": 1}), false).unwrap();
        let outcome = gate.observe(json!({"a": 1}), false).unwrap();

        assert!(!outcome.validated);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_force_always_validates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut gate = ChangeGate::new();
        gate.add_validator(counting_validator(&calls, |_| true));

        gate.observe(json!(5), false).unwrap();
        let outcome = gate.observe(json!(5), true).unwrap();

        assert!(outcome.validated);
        assert!(outcome.change.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_change_reports_old_and_new() {
        let mut gate = ChangeGate::new();
        gate.observe(json!("a"), false).unwrap();

        let outcome = gate.observe(json!("b"), false).unwrap();

        assert_eq!(outcome.change, Some((json!("a"), json!("b"))));
    }

    #[test]
    fn test_failure_keeps_baseline_and_revalidates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut gate = ChangeGate::new();
        gate.add_validator(counting_validator(&calls, |v| v.as_i64() != Some(-1)));

        gate.observe(json!(10), false).unwrap();
        let err = gate.observe(json!(-1), false).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Failed {
                message: "rejected".to_string()
            }
        );
        assert_eq!(gate.last_value(), Some(&json!(10)));

        assert!(gate.observe(json!(-1), false).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_first_failing_validator_wins() {
        let mut gate = ChangeGate::new();
        gate.add_validator(Box::new(PredicateValidator::new("first", |_: &LiveValue| false)));
        gate.add_validator(Box::new(PredicateValidator::new("second", |_: &LiveValue| false)));

        let err = gate.observe(json!(null), false).unwrap_err();

        assert_eq!(
            err,
            ValidationError::Failed {
                message: "first".to_string()
            }
        );
    }

    #[test]
    fn test_key_order_does_not_count_as_change() {
        let mut gate = ChangeGate::new();
        let a: LiveValue = serde_json::from_str(r#"{"x":1,"y":2}"#).unwrap();
        let b: LiveValue = serde_json::from_str(r#"{"y":2,"x":1}"#).unwrap();

        gate.observe(a, false).unwrap();
        let outcome = gate.observe(b, false).unwrap();

        assert!(!outcome.validated);
        assert!(outcome.change.is_none());
    }

    #[test]
    fn test_add_validator_reports_immediacy() {
        let mut gate = ChangeGate::new();
        let eager = PredicateValidator::new("eager", |_: &LiveValue| true);
        let lazy = PredicateValidator::new("lazy", |_: &LiveValue| true).deferred();

        assert!(gate.add_validator(Box::new(eager)));
        assert!(!gate.add_validator(Box::new(lazy)));
        assert_eq!(gate.validator_count(), 2);
    }

    fn arb_value() -> impl Strategy<Value = LiveValue> {
        let leaf = prop_oneof![
            any::<i64>().prop_map(LiveValue::from),
            "[a-z]{0,8}".prop_map(LiveValue::from),
            any::<bool>().prop_map(LiveValue::from),
        ];
        leaf.prop_recursive(2, 12, 4, |inner| {
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|map| LiveValue::Object(map.into_iter().collect()))
        })
    }

    proptest! {
        #[test]
        fn prop_repeat_observation_is_gated(value in arb_value(), repeats in 1usize..6) {
            let calls = Arc::new(AtomicUsize::new(0));
            let mut gate = ChangeGate::new();
            gate.add_validator(counting_validator(&calls, |_| true));

            gate.observe(value.clone(), false).unwrap();
            for _ in 0..repeats {
                let outcome = gate.observe(value.clone(), false).unwrap();
                prop_assert!(!outcome.validated);
                prop_assert!(outcome.change.is_none());
            }
            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn prop_change_carries_previous_baseline(a in arb_value(), b in arb_value()) {
            prop_assume!(a != b);
            let mut gate = ChangeGate::new();
            gate.observe(a.clone(), false).unwrap();

            let outcome = gate.observe(b.clone(), false).unwrap();
            prop_assert_eq!(outcome.change, Some((a, b)));
        }
    }

    #[test]
    fn test_inspect_does_not_move_baseline() {
        let mut gate = ChangeGate::new();
        gate.observe(json!(1), false).unwrap();

        let pending = gate.inspect(json!(2), false).unwrap();
        assert_eq!(pending.change, Some((json!(1), json!(2))));
        assert_eq!(gate.last_value(), Some(&json!(1)));

        let again = gate.inspect(json!(2), false).unwrap();
        assert_eq!(again.change, Some((json!(1), json!(2))));

        gate.commit(&again);
        assert_eq!(gate.last_value(), Some(&json!(2)));
        assert!(gate.inspect(json!(2), false).unwrap().change.is_none());
    }

    #[test]
    fn test_reset_forgets_baseline() {
        let mut gate = ChangeGate::new();
        gate.observe(json!(1), false).unwrap();
        gate.reset();

        let outcome = gate.observe(json!(2), false).unwrap();
        assert!(outcome.change.is_none());
        assert_eq!(gate.state(), GateState::Observed(state_hash(&json!(2))));
    }
}
