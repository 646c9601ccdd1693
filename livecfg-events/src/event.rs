//! Change events delivered to listeners.

use chrono::{DateTime, Utc};
use livecfg_core::LiveValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node in a [`crate::ConfigTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A detected change of one node's value.
///
/// Built once per change and shared by every listener along the propagation
/// path, so ancestors see the node that originally changed as `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    source: NodeId,
    old_value: LiveValue,
    new_value: LiveValue,
    timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        source: NodeId,
        old_value: LiveValue,
        new_value: LiveValue,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            old_value,
            new_value,
            timestamp,
        }
    }

    /// Node whose value changed.
    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn old_value(&self) -> &LiveValue {
        &self.old_value
    }

    pub fn new_value(&self) -> &LiveValue {
        &self.new_value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
