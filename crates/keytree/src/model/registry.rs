//! Identity to node resolution for model indices.
//!
//! A [`ModelIndex`](super::ModelIndex) only carries a [`NodeId`]. The
//! registry maps that id back to the node through a weak handle, so an index
//! that outlives its node resolves to nothing instead of dangling.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use keytree_core::logging::targets;
use parking_lot::Mutex;

use super::item::{ItemRef, NodeId, WeakItemRef};

/// Number of new entries between automatic purges.
const DEFAULT_PURGE_INTERVAL: usize = 256;

struct Entries {
    nodes: HashMap<NodeId, WeakItemRef>,
    inserted_since_purge: usize,
}

/// Weak cache from identity to node.
pub struct NodeRegistry {
    entries: Mutex<Entries>,
    purge_interval: usize,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::with_purge_interval(DEFAULT_PURGE_INTERVAL)
    }

    /// Creates a registry that purges dead entries after every `interval`
    /// new entries. An interval of 0 disables automatic purging.
    pub fn with_purge_interval(interval: usize) -> Self {
        Self {
            entries: Mutex::new(Entries {
                nodes: HashMap::new(),
                inserted_since_purge: 0,
            }),
            purge_interval: interval,
        }
    }

    /// Records `item` so its id resolves. Re-inserting a known node is a no-op.
    pub fn insert(&self, item: &ItemRef) {
        let mut entries = self.entries.lock();
        match entries.nodes.entry(item.id()) {
            Entry::Occupied(_) => return,
            Entry::Vacant(slot) => {
                slot.insert(Arc::downgrade(item));
            }
        }

        entries.inserted_since_purge += 1;
        if self.purge_interval > 0 && entries.inserted_since_purge >= self.purge_interval {
            let removed = Self::purge_locked(&mut entries);
            tracing::trace!(target: targets::MODEL, removed, "registry purged");
        }
    }

    /// Returns the node for `id` if it is still alive.
    ///
    /// A dead entry is dropped on the way.
    pub fn resolve(&self, id: NodeId) -> Option<ItemRef> {
        let mut entries = self.entries.lock();
        let weak = entries.nodes.get(&id)?;
        match weak.upgrade() {
            Some(item) => Some(item),
            None => {
                entries.nodes.remove(&id);
                None
            }
        }
    }

    /// Drops all entries whose node is gone. Returns how many were removed.
    pub fn purge(&self) -> usize {
        Self::purge_locked(&mut self.entries.lock())
    }

    fn purge_locked(entries: &mut Entries) -> usize {
        let before = entries.nodes.len();
        entries.nodes.retain(|_, weak| weak.strong_count() > 0);
        entries.inserted_since_purge = 0;
        before - entries.nodes.len()
    }

    /// Number of entries, dead ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static_assertions::assert_impl_all!(NodeRegistry: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemEventSender, ItemType, LazyItem};

    fn leaf(name: &str) -> ItemRef {
        LazyItem::leaf(ItemType::Key, name, ItemEventSender::new())
    }

    #[test]
    fn test_resolve_live_node() {
        let registry = NodeRegistry::new();
        let item = leaf("a");
        registry.insert(&item);

        let resolved = registry.resolve(item.id()).expect("registered node resolves");
        assert!(Arc::ptr_eq(&resolved, &item));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dropped_node_resolves_to_none() {
        let registry = NodeRegistry::new();
        let item = leaf("a");
        let id = item.id();
        registry.insert(&item);
        drop(item);

        assert!(registry.resolve(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_id() {
        let registry = NodeRegistry::new();
        assert!(registry.resolve(NodeId::next()).is_none());
    }

    #[test]
    fn test_reinsert_is_noop() {
        let registry = NodeRegistry::new();
        let item = leaf("a");
        registry.insert(&item);
        registry.insert(&item);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_manual_purge() {
        let registry = NodeRegistry::with_purge_interval(0);
        let kept = leaf("kept");
        registry.insert(&kept);
        for name in ["x", "y", "z"] {
            registry.insert(&leaf(name));
        }
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.purge(), 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_automatic_purge() {
        let registry = NodeRegistry::with_purge_interval(4);
        for name in ["a", "b", "c"] {
            registry.insert(&leaf(name));
        }
        assert_eq!(registry.len(), 3);

        let live = leaf("d");
        registry.insert(&live);
        assert_eq!(registry.len(), 1);
    }
}
