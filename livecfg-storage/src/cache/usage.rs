//! Usage-based eviction: least-recently-used and most-recently-used.
//!
//! Both strategies share an [`AccessOrder`] index and differ only in where an
//! accessed key moves and which end of the index is evicted on overflow.
//! Usage policies have no staleness: any tracked entry is valid.

use livecfg_core::LiveValue;
use std::collections::VecDeque;

use super::traits::{EntryMetadata, EvictionStrategy, MetadataMap};

/// Access-ordered index of cache keys.
///
/// Front and back carry no fixed meaning; each strategy decides which end
/// is "recent".
#[derive(Debug, Clone, Default)]
pub struct AccessOrder {
    keys: VecDeque<String>,
}

impl AccessOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Keys from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.keys.iter().position(|k| k == key) {
            Some(index) => {
                self.keys.remove(index);
                true
            }
            None => false,
        }
    }

    /// Place `key` at the back, moving it if already present.
    pub fn move_to_back(&mut self, key: &str) {
        self.remove(key);
        self.keys.push_back(key.to_string());
    }

    /// Place `key` at the front, moving it if already present.
    pub fn move_to_front(&mut self, key: &str) {
        self.remove(key);
        self.keys.push_front(key.to_string());
    }

    /// Front-most key other than `exclude`.
    pub fn first_except(&self, exclude: &str) -> Option<&str> {
        self.iter().find(|k| *k != exclude)
    }

    /// Back-most key other than `exclude`.
    pub fn last_except(&self, exclude: &str) -> Option<&str> {
        self.keys.iter().rev().map(String::as_str).find(|k| *k != exclude)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Append `key` and evict until `capacity` holds.
    ///
    /// `pick_victim` chooses among the keys other than `key`, so the key
    /// being admitted is never evicted. Evicted keys are removed from both
    /// the index and `meta`, and returned.
    fn admit<F>(
        &mut self,
        key: &str,
        capacity: usize,
        meta: &mut MetadataMap,
        pick_victim: F,
    ) -> Vec<String>
    where
        F: Fn(&AccessOrder, &str) -> Option<String>,
    {
        self.move_to_back(key);
        meta.insert(key.to_string(), EntryMetadata::Tracked);

        let mut evicted = Vec::new();
        while self.len() > capacity {
            let Some(victim) = pick_victim(self, key) else {
                break;
            };
            self.remove(&victim);
            meta.remove(&victim);
            evicted.push(victim);
        }
        evicted
    }
}

fn tracked(meta: Option<&EntryMetadata>) -> bool {
    meta.is_some()
}

/// Evicts the least recently used key when capacity is exceeded.
///
/// Insertions and reads move a key to the back; the front is evicted.
#[derive(Debug, Clone)]
pub struct LruStrategy {
    capacity: usize,
    order: AccessOrder,
}

impl LruStrategy {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: AccessOrder::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn order(&self) -> &AccessOrder {
        &self.order
    }
}

impl EvictionStrategy for LruStrategy {
    fn kind(&self) -> &'static str {
        "lru"
    }

    fn is_valid(&self, meta: Option<&EntryMetadata>) -> bool {
        tracked(meta)
    }

    fn on_insertion(
        &mut self,
        key: &str,
        _value: &LiveValue,
        meta: &mut MetadataMap,
    ) -> Vec<String> {
        self.order.admit(key, self.capacity, meta, |order, admitted| {
            order.first_except(admitted).map(str::to_string)
        })
    }

    fn on_access(&mut self, key: &str, _meta: &mut MetadataMap) {
        if self.order.contains(key) {
            self.order.move_to_back(key);
        }
    }

    fn on_invalidation(&mut self, key: &str, _stale: &LiveValue) -> Option<LiveValue> {
        self.order.remove(key);
        None
    }

    fn on_removal(&mut self, key: &str) {
        self.order.remove(key);
    }

    fn on_clear(&mut self) {
        self.order.clear();
    }
}

/// Evicts the most recently inserted key when capacity is exceeded.
///
/// Insertions append to the back; reads move a key to the front, out of
/// eviction range. On overflow the back-most key other than the one just
/// inserted is evicted.
#[derive(Debug, Clone)]
pub struct MruStrategy {
    capacity: usize,
    order: AccessOrder,
}

impl MruStrategy {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: AccessOrder::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn order(&self) -> &AccessOrder {
        &self.order
    }
}

impl EvictionStrategy for MruStrategy {
    fn kind(&self) -> &'static str {
        "mru"
    }

    fn is_valid(&self, meta: Option<&EntryMetadata>) -> bool {
        tracked(meta)
    }

    fn on_insertion(
        &mut self,
        key: &str,
        _value: &LiveValue,
        meta: &mut MetadataMap,
    ) -> Vec<String> {
        self.order.admit(key, self.capacity, meta, |order, admitted| {
            order.last_except(admitted).map(str::to_string)
        })
    }

    fn on_access(&mut self, key: &str, _meta: &mut MetadataMap) {
        if self.order.contains(key) {
            self.order.move_to_front(key);
        }
    }

    fn on_invalidation(&mut self, key: &str, _stale: &LiveValue) -> Option<LiveValue> {
        self.order.remove(key);
        None
    }

    fn on_removal(&mut self, key: &str) {
        self.order.remove(key);
    }

    fn on_clear(&mut self) {
        self.order.clear();
    }
}
