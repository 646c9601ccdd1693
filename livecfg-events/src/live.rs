//! Node-bound configuration items.
//!
//! A [`LiveItem`] resolves its value on every read, passes it through its
//! [`ChangeGate`] and reports accepted changes to the tree. A [`StaticItem`]
//! holds a plain value and reports a change only when a write actually
//! alters it.

use livecfg_core::{LiveResult, LiveValue, StateResolver, TreeError, Validator};

use crate::event::NodeId;
use crate::gate::{ChangeGate, GateState};
use crate::tree::ConfigTree;

/// A live attribute attached to a tree node.
pub struct LiveItem<R> {
    node: NodeId,
    resolver: R,
    gate: ChangeGate,
}

impl<R: StateResolver> LiveItem<R> {
    pub fn new(node: NodeId, resolver: R) -> Self {
        Self {
            node,
            resolver,
            gate: ChangeGate::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn validator_count(&self) -> usize {
        self.gate.validator_count()
    }

    /// Current value, validated if its content changed since the last read.
    pub fn value(&mut self, tree: &ConfigTree) -> LiveResult<LiveValue> {
        self.evaluate(tree, false)
    }

    /// Resolve, gate and, on an accepted change, notify `tree`.
    ///
    /// Validation and change notification happen together: a change is only
    /// reported for a value every validator accepted, and the value only
    /// becomes the baseline once the change was delivered. If notification
    /// fails the same change is detected again on the next read.
    pub fn evaluate(&mut self, tree: &ConfigTree, force: bool) -> LiveResult<LiveValue> {
        let value = self.resolver.resolve()?;
        let outcome = self.gate.inspect(value, force)?;

        if let Some((old, new)) = &outcome.change {
            tree.notify(self.node, old, new)?;
        }
        self.gate.commit(&outcome);
        Ok(outcome.value)
    }

    /// Attach a validator, validating right away if it asks for that.
    ///
    /// On an immediate validation failure the validator stays attached and
    /// the error is returned.
    pub fn add_validator(
        &mut self,
        tree: &ConfigTree,
        validator: Box<dyn Validator>,
    ) -> LiveResult<&mut Self> {
        if self.gate.add_validator(validator) {
            self.evaluate(tree, true)?;
        }
        Ok(self)
    }

    /// Closure that re-evaluates the item on every call.
    pub fn as_callable<'a>(
        &'a mut self,
        tree: &'a ConfigTree,
    ) -> impl FnMut() -> LiveResult<LiveValue> + 'a {
        move || self.evaluate(tree, false)
    }
}

impl<R> std::fmt::Debug for LiveItem<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveItem")
            .field("node", &self.node)
            .field("gate", &self.gate)
            .finish()
    }
}

/// A plain value attached to a tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticItem {
    node: NodeId,
    value: LiveValue,
}

impl StaticItem {
    pub fn new(node: NodeId, value: LiveValue) -> Self {
        Self { node, value }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn get(&self) -> &LiveValue {
        &self.value
    }

    /// Replace the value. Returns whether it changed; equal writes notify nobody.
    pub fn set(&mut self, tree: &ConfigTree, value: LiveValue) -> Result<bool, TreeError> {
        if self.value == value {
            return Ok(false);
        }
        tree.notify(self.node, &self.value, &value)?;
        self.value = value;
        Ok(true)
    }
}
