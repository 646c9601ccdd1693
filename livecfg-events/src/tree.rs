//! Arena-backed configuration tree with upward change propagation.
//!
//! Nodes live in a flat table and refer to their parent by [`NodeId`], so a
//! child never holds an owning pointer to its parent and no reference
//! cycles can form. Each node carries its own listener list.
//!
//! # Propagation
//!
//! ```text
//! root   ← listeners run third
//!  └─ db ← listeners run second
//!      └─ host (changed) ← listeners run first
//! ```
//!
//! `notify` runs the changed node's listeners in registration order, then
//! walks parent links up to the root running each ancestor's listeners with
//! the same event. Nothing propagates downward or sideways.

use livecfg_core::{Clock, ListenerError, LiveValue, SystemClock, TreeError};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::event::{ChangeEvent, NodeId};

/// Callback invoked with each change event reaching its node.
///
/// Errors and panics are reported by the propagator and never reach the
/// code that triggered the change.
pub type Listener = Arc<dyn Fn(&ChangeEvent) -> Result<(), ListenerError> + Send + Sync>;

/// Outcome of one `notify` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Listener invocations that returned Ok
    pub delivered: usize,
    /// Listener invocations that returned an error or panicked
    pub failed: usize,
    /// Nodes on the path from the changed node to the root, inclusive
    pub nodes_visited: usize,
}

struct Node {
    name: String,
    parent: Option<NodeId>,
    listeners: Vec<Listener>,
}

/// Tree of configuration nodes and their change listeners.
///
/// Mutation (adding nodes, re-parenting, registering listeners) takes
/// `&mut self`; `notify` takes `&self`. A listener list therefore cannot
/// change while a notification is in flight. Callers sharing a tree across
/// threads wrap it in their own lock.
pub struct ConfigTree {
    nodes: Vec<Node>,
    clock: Arc<dyn Clock>,
}

impl ConfigTree {
    /// Create a tree holding only an unnamed root.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a tree whose events are timestamped by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            nodes: vec![Node {
                name: String::new(),
                parent: None,
                listeners: Vec::new(),
            }],
            clock,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, root included. Never zero.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    /// Add a named child under `parent`.
    pub fn add_node(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId, TreeError> {
        self.node(parent)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.into(),
            parent: Some(parent),
            listeners: Vec::new(),
        });
        Ok(id)
    }

    pub fn name(&self, node: NodeId) -> Result<&str, TreeError> {
        Ok(&self.node(node)?.name)
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        Ok(self.node(node)?.parent)
    }

    /// Re-attach `node` under `parent`, or detach it with `None`.
    ///
    /// Fails with [`TreeError::CycleDetected`] when `parent` is `node` itself
    /// or one of its descendants.
    pub fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), TreeError> {
        self.node(node)?;
        if let Some(parent) = parent {
            self.node(parent)?;
            if self.ancestors(parent).any(|id| id == node) {
                return Err(TreeError::CycleDetected {
                    node: node.0,
                    parent: parent.0,
                });
            }
        }
        self.node_mut(node)?.parent = parent;
        Ok(())
    }

    /// Dotted name from the topmost ancestor down to `node`.
    ///
    /// Unnamed nodes (the root) contribute no segment.
    pub fn path(&self, node: NodeId) -> Result<String, TreeError> {
        self.node(node)?;
        let mut segments: Vec<&str> = self
            .ancestors(node)
            .filter_map(|id| self.nodes.get(id.0))
            .map(|n| n.name.as_str())
            .filter(|name| !name.is_empty())
            .collect();
        segments.reverse();
        Ok(segments.join("."))
    }

    /// Register a listener on `node` and hand it back for later removal.
    ///
    /// Registering the same `Arc` twice keeps a single registration.
    pub fn add_listener(&mut self, node: NodeId, listener: Listener) -> Result<Listener, TreeError> {
        let listeners = &mut self.node_mut(node)?.listeners;
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener.clone());
        }
        Ok(listener)
    }

    /// Register an infallible closure as a listener.
    pub fn on_change<F>(&mut self, node: NodeId, callback: F) -> Result<Listener, TreeError>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(move |event: &ChangeEvent| -> Result<(), ListenerError> {
            callback(event);
            Ok(())
        });
        self.add_listener(node, listener)
    }

    /// Unregister `listener`. Returns false if it was not registered on `node`.
    pub fn remove_listener(&mut self, node: NodeId, listener: &Listener) -> Result<bool, TreeError> {
        let listeners = &mut self.node_mut(node)?.listeners;
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        Ok(listeners.len() != before)
    }

    pub fn clear_listeners(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.node_mut(node)?.listeners.clear();
        Ok(())
    }

    pub fn listener_count(&self, node: NodeId) -> Result<usize, TreeError> {
        Ok(self.node(node)?.listeners.len())
    }

    /// Deliver a change of `node` to its listeners and every ancestor's.
    ///
    /// A failing or panicking listener is logged and counted; the remaining
    /// listeners and ancestors are still notified.
    pub fn notify(
        &self,
        node: NodeId,
        old_value: &LiveValue,
        new_value: &LiveValue,
    ) -> Result<PropagationReport, TreeError> {
        self.node(node)?;
        let event = ChangeEvent::new(
            node,
            old_value.clone(),
            new_value.clone(),
            self.clock.now(),
        );

        let mut report = PropagationReport::default();
        for id in self.ancestors(node) {
            report.nodes_visited += 1;
            let Some(current) = self.nodes.get(id.0) else {
                break;
            };
            if current.listeners.is_empty() {
                continue;
            }

            for listener in &current.listeners {
                match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                    Ok(Ok(())) => report.delivered += 1,
                    Ok(Err(err)) => {
                        report.failed += 1;
                        tracing::error!(node = %id, source = %node, error = %err, "Change listener failed");
                    }
                    Err(payload) => {
                        report.failed += 1;
                        tracing::error!(
                            node = %id,
                            source = %node,
                            panic = %panic_message(payload.as_ref()),
                            "Change listener panicked"
                        );
                    }
                }
            }
        }

        tracing::debug!(
            source = %node,
            delivered = report.delivered,
            failed = report.failed,
            nodes_visited = report.nodes_visited,
            "Propagated change"
        );
        Ok(report)
    }

    /// `node` followed by each ancestor up to the topmost one.
    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), move |id| {
            self.nodes.get(id.0).and_then(|n| n.parent)
        })
    }

    fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(id.0).ok_or(TreeError::UnknownNode { id: id.0 })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(TreeError::UnknownNode { id: id.0 })
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigTree")
            .field("nodes", &self.nodes.len())
            .field("clock", &self.clock)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &str) -> Listener {
        let log = log.clone();
        let label = label.to_string();
        Arc::new(move |event: &ChangeEvent| -> Result<(), ListenerError> {
            log.lock().unwrap().push(format!(
                "{label}:{}->{}",
                event.old_value(),
                event.new_value()
            ));
            Ok(())
        })
    }

    fn three_levels() -> (ConfigTree, NodeId, NodeId, NodeId) {
        let mut tree = ConfigTree::new();
        let root = tree.root();
        let mid = tree.add_node(root, "db").unwrap();
        let leaf = tree.add_node(mid, "host").unwrap();
        (tree, root, mid, leaf)
    }

    #[test]
    fn test_propagates_leaf_to_root_in_order() {
        let (mut tree, root, mid, leaf) = three_levels();
        let log = Arc::new(Mutex::new(Vec::new()));
        tree.add_listener(root, recorder(&log, "root")).unwrap();
        tree.add_listener(mid, recorder(&log, "mid")).unwrap();
        tree.add_listener(leaf, recorder(&log, "leaf")).unwrap();

        let report = tree.notify(leaf, &json!(1), &json!(2)).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["leaf:1->2", "mid:1->2", "root:1->2"]
        );
        assert_eq!(report.delivered, 3);
        assert_eq!(report.nodes_visited, 3);
    }

    #[test]
    fn test_no_downward_or_sideways_propagation() {
        let (mut tree, _root, mid, leaf) = three_levels();
        let sibling = tree.add_node(mid, "port").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        tree.add_listener(leaf, recorder(&log, "leaf")).unwrap();
        tree.add_listener(sibling, recorder(&log, "sibling")).unwrap();

        tree.notify(mid, &json!("a"), &json!("b")).unwrap();

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_node_without_listeners_still_propagates() {
        let (mut tree, root, _mid, leaf) = three_levels();
        let log = Arc::new(Mutex::new(Vec::new()));
        tree.add_listener(root, recorder(&log, "root")).unwrap();

        tree.notify(leaf, &json!(null), &json!(true)).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["root:null->true"]);
    }

    #[test]
    fn test_failing_listener_does_not_block_siblings() {
        let (mut tree, root, _mid, leaf) = three_levels();
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: Listener = Arc::new(|_: &ChangeEvent| -> Result<(), ListenerError> {
            Err(ListenerError::failed("boom"))
        });
        tree.add_listener(leaf, failing).unwrap();
        tree.add_listener(leaf, recorder(&log, "second")).unwrap();
        tree.add_listener(root, recorder(&log, "root")).unwrap();

        let report = tree.notify(leaf, &json!(1), &json!(2)).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["second:1->2", "root:1->2"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 2);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let (mut tree, _root, _mid, leaf) = three_levels();
        let log = Arc::new(Mutex::new(Vec::new()));
        tree.on_change(leaf, |_| panic!("listener exploded")).unwrap();
        tree.add_listener(leaf, recorder(&log, "after")).unwrap();

        let report = tree.notify(leaf, &json!(1), &json!(2)).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(*log.lock().unwrap(), vec!["after:1->2"]);
    }

    #[test]
    fn test_event_source_is_changed_node_at_every_level() {
        let (mut tree, root, _mid, leaf) = three_levels();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        tree.on_change(root, move |event| sink.lock().unwrap().push(event.source()))
            .unwrap();

        tree.notify(leaf, &json!(1), &json!(2)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![leaf]);
    }

    #[test]
    fn test_duplicate_registration_and_removal() {
        let (mut tree, _root, mid, _leaf) = three_levels();
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder(&log, "mid");

        let returned = tree.add_listener(mid, listener.clone()).unwrap();
        tree.add_listener(mid, listener.clone()).unwrap();
        assert!(Arc::ptr_eq(&returned, &listener));
        assert_eq!(tree.listener_count(mid).unwrap(), 1);

        assert!(tree.remove_listener(mid, &listener).unwrap());
        assert!(!tree.remove_listener(mid, &listener).unwrap());
        assert_eq!(tree.listener_count(mid).unwrap(), 0);
    }

    #[test]
    fn test_clear_listeners() {
        let (mut tree, _root, mid, _leaf) = three_levels();
        tree.on_change(mid, |_| {}).unwrap();
        tree.on_change(mid, |_| {}).unwrap();
        assert_eq!(tree.listener_count(mid).unwrap(), 2);

        tree.clear_listeners(mid).unwrap();
        assert_eq!(tree.listener_count(mid).unwrap(), 0);
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let (mut tree, root, mid, leaf) = three_levels();

        assert_eq!(
            tree.set_parent(mid, Some(leaf)),
            Err(TreeError::CycleDetected {
                node: mid.index(),
                parent: leaf.index()
            })
        );
        assert!(tree.set_parent(mid, Some(mid)).is_err());
        assert_eq!(tree.parent(mid).unwrap(), Some(root));
    }

    #[test]
    fn test_reparent_changes_propagation_path() {
        let (mut tree, root, mid, leaf) = three_levels();
        let log = Arc::new(Mutex::new(Vec::new()));
        tree.add_listener(mid, recorder(&log, "mid")).unwrap();

        tree.set_parent(leaf, Some(root)).unwrap();
        tree.notify(leaf, &json!(1), &json!(2)).unwrap();
        assert!(log.lock().unwrap().is_empty());

        tree.set_parent(leaf, None).unwrap();
        let report = tree.notify(leaf, &json!(1), &json!(2)).unwrap();
        assert_eq!(report.nodes_visited, 1);
    }

    #[test]
    fn test_path_and_names() {
        let (tree, root, mid, leaf) = three_levels();

        assert_eq!(tree.path(leaf).unwrap(), "db.host");
        assert_eq!(tree.path(root).unwrap(), "");
        assert_eq!(tree.name(mid).unwrap(), "db");
        assert_eq!(tree.node_count(), 3);
        assert_eq!(ConfigTree::new().node_count(), 1);
    }

    #[test]
    fn test_unknown_node_errors() {
        let mut tree = ConfigTree::new();
        let ghost = NodeId(42);

        assert_eq!(
            tree.notify(ghost, &json!(1), &json!(2)),
            Err(TreeError::UnknownNode { id: 42 })
        );
        assert!(tree.add_node(ghost, "x").is_err());
        assert!(tree.on_change(ghost, |_| {}).is_err());
        assert!(!tree.contains(ghost));
    }
}
