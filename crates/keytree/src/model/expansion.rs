//! Bookkeeping of expanded namespaces.
//!
//! When a database reloads, its namespace nodes are replaced by new ones with
//! new identities. The tracker remembers expanded namespaces by original name
//! so the same paths can be reopened once the new children arrive.

use std::collections::HashSet;

use keytree_core::logging::targets;
use parking_lot::Mutex;

use super::index::ModelIndex;
use super::item::{ItemRef, ItemType};
use super::role::{ItemData, ItemRole};
use super::traits::{ItemModel, MatchFlags};

/// Set of original names of expanded namespace nodes.
#[derive(Debug, Default)]
pub struct ExpansionTracker {
    expanded: Mutex<HashSet<String>>,
}

impl ExpansionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `item` as expanded. Returns `false` for non-namespace nodes.
    pub fn mark_expanded(&self, item: &ItemRef) -> bool {
        if item.item_type() != ItemType::Namespace {
            return false;
        }
        self.expanded.lock().insert(item.original_name());
        true
    }

    /// Forgets `item`. Returns `false` for non-namespace nodes.
    pub fn mark_collapsed(&self, item: &ItemRef) -> bool {
        if item.item_type() != ItemType::Namespace {
            return false;
        }
        self.expanded.lock().remove(&item.original_name());
        true
    }

    /// Finds the tracked namespaces below `db_index` again.
    ///
    /// The tracked set is cleared first; the returned indices are the ones to
    /// expand, and expanding them re-populates the set. Search starts at the
    /// database's first child and is exact, case sensitive and recursive.
    /// The order of the result is unspecified.
    ///
    /// Nothing happens unless `db_index` still resolves to a database; the
    /// tracked set is kept in that case.
    pub fn restore<M>(&self, model: &M, db_index: &ModelIndex) -> Vec<ModelIndex>
    where
        M: ItemModel + ?Sized,
    {
        let item_type = model.data(db_index, ItemRole::Type).to_text();
        if item_type.as_deref() != Some(ItemType::Database.as_str()) {
            tracing::trace!(target: targets::EXPANSION, ?db_index, "not a live database, nothing restored");
            return Vec::new();
        }

        let names = self.take();
        let search_from = model.index(0, 0, db_index);

        let mut hits = Vec::new();
        for name in names {
            let matches = model.match_items(
                &search_from,
                ItemRole::OriginalName,
                &ItemData::String(name),
                None,
                MatchFlags::fixed_recursive(),
            );
            hits.extend(matches);
        }

        tracing::debug!(target: targets::EXPANSION, restored = hits.len(), "namespaces restored");
        hits
    }

    /// Removes and returns the tracked names.
    pub fn take(&self) -> HashSet<String> {
        std::mem::take(&mut *self.expanded.lock())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.expanded.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.expanded.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.expanded.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionsModel, ItemEventSender, LazyItem, ModelConfig};

    #[test]
    fn test_only_namespaces_are_tracked() {
        let tracker = ExpansionTracker::new();
        let events = ItemEventSender::new();
        let ns: ItemRef = LazyItem::leaf(ItemType::Namespace, "users", events.clone());
        let key: ItemRef = LazyItem::leaf(ItemType::Key, "users:1", events);

        assert!(tracker.mark_expanded(&ns));
        assert!(!tracker.mark_expanded(&key));
        assert!(tracker.contains("users"));
        assert_eq!(tracker.len(), 1);

        assert!(!tracker.mark_collapsed(&key));
        assert!(tracker.mark_collapsed(&ns));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_take_empties_set() {
        let tracker = ExpansionTracker::new();
        let ns: ItemRef = LazyItem::leaf(ItemType::Namespace, "orders", ItemEventSender::new());
        tracker.mark_expanded(&ns);

        let taken = tracker.take();
        assert!(taken.contains("orders"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_restore_finds_nested_namespaces() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let events = model.item_events();

        let nested: ItemRef = LazyItem::builder(ItemType::Namespace, "users:active", events.clone())
            .children(vec![LazyItem::leaf(ItemType::Key, "users:active:1", events.clone()) as ItemRef])
            .build();
        let users: ItemRef = LazyItem::builder(ItemType::Namespace, "users", events.clone())
            .children(vec![nested])
            .build();
        let other: ItemRef = LazyItem::leaf(ItemType::Namespace, "Users", events.clone());
        let db = LazyItem::builder(ItemType::Database, "db0", events.clone())
            .children(vec![other, users])
            .build();
        model.add_root_item(db);

        let tracker = ExpansionTracker::new();
        for name in ["users", "users:active", "gone"] {
            let ns: ItemRef = LazyItem::leaf(ItemType::Namespace, name, ItemEventSender::new());
            tracker.mark_expanded(&ns);
        }

        let db_index = model.index(0, 0, &ModelIndex::invalid());
        let mut names: Vec<String> = tracker
            .restore(&*model, &db_index)
            .iter()
            .filter_map(|index| model.data(index, ItemRole::OriginalName).into_string())
            .collect();
        names.sort();

        assert_eq!(names, vec!["users".to_string(), "users:active".to_string()]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_restore_on_empty_database() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let db = LazyItem::leaf(ItemType::Database, "db0", model.item_events());
        model.add_root_item(db);

        let tracker = ExpansionTracker::new();
        let ns: ItemRef = LazyItem::leaf(ItemType::Namespace, "users", ItemEventSender::new());
        tracker.mark_expanded(&ns);

        let db_index = model.index(0, 0, &ModelIndex::invalid());
        assert!(tracker.restore(&*model, &db_index).is_empty());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_restore_needs_live_database() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let events = model.item_events();

        let users: ItemRef = LazyItem::leaf(ItemType::Namespace, "users", events.clone());
        let db_a = LazyItem::builder(ItemType::Database, "dbA", events.clone())
            .children(vec![users.clone()])
            .build();
        let db_b: ItemRef = LazyItem::leaf(ItemType::Database, "dbB", events.clone());
        model.add_root_item(db_a);
        model.add_root_item(db_b.clone());

        let tracker = ExpansionTracker::new();
        tracker.mark_expanded(&users);

        let stale = model.index(1, 0, &ModelIndex::invalid());
        model.remove_root_item(&db_b);
        drop(db_b);
        assert!(tracker.restore(&*model, &stale).is_empty());
        assert!(tracker.restore(&*model, &ModelIndex::invalid()).is_empty());

        let ns_index = model.index(0, 0, &model.index(0, 0, &ModelIndex::invalid()));
        assert!(tracker.restore(&*model, &ns_index).is_empty());
        assert!(tracker.contains("users"));
    }
}
