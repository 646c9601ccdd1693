//! livecfg Events - Change Gate and Upward Propagation
//!
//! Change detection and notification for configuration trees.
//!
//! # Architecture
//!
//! ```text
//! resolve() → ChangeGate ──(accepted change)──→ ConfigTree::notify
//!                                                  leaf → parent → … → root
//! ```
//!
//! # Key Types
//!
//! - `ConfigTree`: arena of nodes with parent links and per-node listeners
//! - `ChangeEvent`: one detected change, shared along the propagation path
//! - `ChangeGate`: hash-gated validation, the "nothing really changed" filter
//! - `LiveItem` / `StaticItem`: values bound to tree nodes

mod event;
mod gate;
mod live;
mod tree;

pub use event::{ChangeEvent, NodeId};
pub use gate::{ChangeGate, GateOutcome, GateState};
pub use live::{LiveItem, StaticItem};
pub use tree::{ConfigTree, Listener, PropagationReport};

// Re-export core types for convenience
pub use livecfg_core::{ListenerError, LiveValue, TreeError, ValidationError, Validator};
