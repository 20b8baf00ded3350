//! The connections tree model.
//!
//! [`ConnectionsModel`] exposes a tree of [`TreeItem`]s through the
//! positional [`ItemModel`] interface. Root items (servers) are owned by the
//! model; everything below is owned by its parent node and may be loaded
//! lazily. Indices carry only a node identity, resolved through a
//! [`NodeRegistry`], so an index whose node was removed simply resolves to
//! nothing.
//!
//! Nodes report structural changes on the model's item event channel (see
//! [`ConnectionsModel::item_events`]); the model turns them into row
//! insert/remove brackets and, for databases, into expand requests that
//! reopen previously expanded namespaces.
//!
//! # Example
//!
//! ```
//! use keytree::model::{
//!     ConnectionsModel, ItemModel, ItemRef, ItemRole, ItemType, LazyItem, ModelConfig, ModelIndex,
//! };
//!
//! let model = ConnectionsModel::new(ModelConfig::default());
//! let events = model.item_events();
//!
//! let server = LazyItem::builder(ItemType::Server, "local", events.clone())
//!     .children(vec![LazyItem::leaf(ItemType::Database, "db0", events) as ItemRef])
//!     .build();
//! model.add_root_item(server);
//!
//! let root = model.index(0, 0, &ModelIndex::invalid());
//! let db = model.index(0, 0, &root);
//! assert_eq!(model.data(&db, ItemRole::Display).as_string(), Some("db0"));
//! assert_eq!(model.parent(&db), root);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use keytree_core::logging::targets;
use keytree_core::{ConnectionId, ConnectionType, PerfSpan, Signal, ThreadAffinity};
use parking_lot::RwLock;

use super::expansion::ExpansionTracker;
use super::index::ModelIndex;
use super::item::{ItemEvent, ItemEventKind, ItemEventSender, ItemRef, ItemType, WeakItemRef};
use super::registry::NodeRegistry;
use super::role::{ItemData, ItemRole};
use super::traits::{ItemFlags, ItemModel, ModelSignals};
use crate::settings::Settings;

/// Settings key of the "reopen namespaces on reload" option.
pub const REOPEN_NAMESPACES_KEY: &str = "app/reopenNamespacesOnReload";

/// Options injected into a [`ConnectionsModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Reopen previously expanded namespaces after a database reloads.
    pub restore_expanded_namespaces: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            restore_expanded_namespaces: true,
        }
    }
}

impl ModelConfig {
    /// Reads the options from `settings`, using defaults for missing keys.
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            restore_expanded_namespaces: settings
                .get_or(REOPEN_NAMESPACES_KEY, defaults.restore_expanded_namespaces),
        }
    }

    pub fn with_restore_expanded_namespaces(mut self, restore: bool) -> Self {
        self.restore_expanded_namespaces = restore;
        self
    }
}

/// Model over the server / database / namespace / key tree.
///
/// The thread that calls [`ConnectionsModel::new`] is the model's control
/// thread. Structural changes must happen there; loaders that finish on other
/// threads are routed back through that thread's
/// [`Dispatcher`](keytree_core::Dispatcher).
pub struct ConnectionsModel {
    roots: RwLock<Vec<ItemRef>>,
    registry: NodeRegistry,
    expansion: ExpansionTracker,
    config: ModelConfig,
    signals: ModelSignals,
    expand: Signal<ModelIndex>,
    item_events: ItemEventSender,
    listener: ConnectionId,
    affinity: ThreadAffinity,
}

impl ConnectionsModel {
    /// Creates an empty model listening on its own item event channel.
    pub fn new(config: ModelConfig) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<ConnectionsModel>| {
            let item_events = ItemEventSender::new();
            let model = this.clone();
            let listener = item_events.listen(
                move |event| {
                    if let Some(model) = model.upgrade() {
                        model.on_item_event(event);
                    }
                },
                ConnectionType::Auto,
            );

            tracing::debug!(target: targets::MODEL, ?config, "connections model created");
            Self {
                roots: RwLock::new(Vec::new()),
                registry: NodeRegistry::new(),
                expansion: ExpansionTracker::new(),
                config,
                signals: ModelSignals::new(),
                expand: Signal::new(),
                item_events,
                listener,
                affinity: ThreadAffinity::current(),
            }
        })
    }

    pub fn config(&self) -> ModelConfig {
        self.config
    }

    /// The channel nodes of this model report on. Pass it to every node
    /// created for this model.
    pub fn item_events(&self) -> ItemEventSender {
        self.item_events.clone()
    }

    /// Request to visually expand the node at the given index.
    pub fn expand(&self) -> &Signal<ModelIndex> {
        &self.expand
    }

    pub fn expansion(&self) -> &ExpansionTracker {
        &self.expansion
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// The node at `index`, if it is still alive.
    pub fn item(&self, index: &ModelIndex) -> Option<ItemRef> {
        self.registry.resolve(index.node_id()?)
    }

    fn create_index(&self, item: &ItemRef, row: usize, column: usize) -> ModelIndex {
        self.registry.insert(item);
        ModelIndex::new(row, column, item.id().as_u64())
    }

    /// Column 0 index of a live node; invalid if the node is gone.
    pub fn index_for_item(&self, item: &WeakItemRef) -> ModelIndex {
        match item.upgrade() {
            Some(item) => self.create_index(&item, item.row(), 0),
            None => ModelIndex::invalid(),
        }
    }

    /// Number of root items.
    pub fn size(&self) -> usize {
        self.roots.read().len()
    }

    /// Appends a root item.
    ///
    /// Adding an item that already is a root does nothing.
    pub fn add_root_item(&self, item: ItemRef) {
        self.affinity.debug_assert_same_thread();

        let row = {
            let roots = self.roots.read();
            if roots.iter().any(|root| root.id() == item.id()) {
                return;
            }
            roots.len()
        };

        self.signals.emit_rows_inserted(ModelIndex::invalid(), row, row, || {
            item.set_row(row);
            item.set_parent(None);
            self.roots.write().push(item.clone());
        });
        tracing::debug!(target: targets::MODEL, row, name = %item.original_name(), "root item added");
    }

    /// Removes a root item by identity and renumbers the following roots.
    ///
    /// Removing an item that is not a root does nothing.
    pub fn remove_root_item(&self, item: &ItemRef) {
        self.affinity.debug_assert_same_thread();

        let Some(row) = self.roots.read().iter().position(|root| root.id() == item.id()) else {
            return;
        };

        self.signals.emit_rows_removed(ModelIndex::invalid(), row, row, || {
            let mut roots = self.roots.write();
            roots.remove(row);
            for (position, root) in roots.iter().enumerate().skip(row) {
                root.set_row(position);
            }
        });
        tracing::debug!(target: targets::MODEL, row, name = %item.original_name(), "root item removed");
    }

    /// Removes every root item.
    pub fn clear(&self) {
        self.affinity.debug_assert_same_thread();

        let mut removed = Vec::new();
        self.signals
            .emit_reset(|| removed = std::mem::take(&mut *self.roots.write()));
        drop(removed);
        self.registry.purge();
        self.expansion.clear();
    }

    /// Metadata of the node at `index`, or [`ItemData::None`].
    pub fn metadata(&self, index: &ModelIndex, key: &str) -> ItemData {
        self.item(index)
            .map(|item| item.metadata(key))
            .unwrap_or_default()
    }

    pub fn set_metadata(&self, index: &ModelIndex, key: &str, value: ItemData) {
        if let Some(item) = self.item(index) {
            item.set_metadata(key, value);
        }
    }

    /// Forwards a named command to the node at `index`.
    pub fn send_event(&self, index: &ModelIndex, event: &str) {
        tracing::debug!(target: targets::MODEL, event, "event received");
        if let Some(item) = self.item(index) {
            item.handle_event(event);
        }
    }

    pub fn item_icon(&self, index: &ModelIndex) -> ItemData {
        self.data(index, ItemRole::Decoration)
    }

    pub fn item_type(&self, index: &ModelIndex) -> ItemData {
        self.data(index, ItemRole::Type)
    }

    /// Records a namespace as expanded. Other nodes are ignored.
    pub fn set_expanded(&self, index: &ModelIndex) {
        if let Some(item) = self.item(index) {
            self.expansion.mark_expanded(&item);
        }
    }

    /// Records a namespace as collapsed. Other nodes are ignored.
    pub fn set_collapsed(&self, index: &ModelIndex) {
        if let Some(item) = self.item(index) {
            self.expansion.mark_collapsed(&item);
        }
    }

    /// Emits [`expand`](Self::expand) for every tracked namespace found
    /// below `db_index`, clearing the tracked set first.
    pub fn restore_opened_namespaces(&self, db_index: &ModelIndex) {
        let _span = PerfSpan::new("restore_opened_namespaces");
        for index in self.expansion.restore(self, db_index) {
            self.expand.emit(index);
        }
    }

    /// Names under which the roles are published to consumers.
    pub fn role_names(&self) -> HashMap<ItemRole, &'static str> {
        HashMap::from([(ItemRole::Display, "name"), (ItemRole::Type, "type")])
    }

    /// Current position of `item` in its owner's child sequence, or in the
    /// root list when it has no parent. Falls back to the stored row.
    fn position_of(&self, item: &ItemRef) -> usize {
        let id = item.id();
        let position = match item.parent().and_then(|owner| owner.upgrade()) {
            Some(owner) => (0..owner.child_count())
                .find(|&row| owner.child(row).is_some_and(|child| child.id() == id)),
            None => self.roots.read().iter().position(|root| root.id() == id),
        };
        position.unwrap_or_else(|| item.row())
    }

    /// Returns `true` if `item` hangs below one of this model's roots.
    fn is_attached(&self, item: &ItemRef) -> bool {
        let mut top = item.clone();
        while let Some(parent) = top.parent().and_then(|parent| parent.upgrade()) {
            top = parent;
        }
        self.roots.read().iter().any(|root| root.id() == top.id())
    }

    fn on_item_event(&self, event: &ItemEvent) {
        let Some(item) = event.item.upgrade() else {
            tracing::trace!(target: targets::MODEL, kind = ?event.kind, "event for a dropped node ignored");
            return;
        };
        if !self.is_attached(&item) {
            tracing::trace!(target: targets::MODEL, node = %item.id(), kind = ?event.kind, "event for a detached node ignored");
            return;
        }

        let index = self.create_index(&item, item.row(), 0);
        match event.kind {
            ItemEventKind::Changed => {
                // Childless nodes are not refreshed.
                if item.child_count() == 0 {
                    return;
                }
                self.signals.emit_data_changed_single(index, Vec::new());
            }
            ItemEventKind::ChildrenLoaded => self.on_children_loaded(&item, index),
            ItemEventKind::ChildrenUnloaded => {
                let count = item.child_count();
                if count > 0 {
                    self.signals.emit_rows_removed(index, 0, count - 1, || {});
                }
            }
        }
    }

    fn on_children_loaded(&self, item: &ItemRef, index: ModelIndex) {
        let count = item.child_count();
        if count > 0 {
            self.signals.emit_rows_inserted(index, 0, count - 1, || {});
        }

        if item.item_type() != ItemType::Database {
            return;
        }

        self.expand.emit(index);
        if self.config.restore_expanded_namespaces {
            self.restore_opened_namespaces(&index);
        } else {
            tracing::debug!(target: targets::EXPANSION, "namespace reopening is disabled");
            self.expansion.clear();
        }
    }
}

impl ItemModel for ConnectionsModel {
    fn row_count(&self, parent: &ModelIndex) -> usize {
        match self.item(parent) {
            None => self.size(),
            Some(_) if parent.column() > 0 => 0,
            Some(item) => item.child_count(),
        }
    }

    fn column_count(&self, _parent: &ModelIndex) -> usize {
        1
    }

    fn data(&self, index: &ModelIndex, role: ItemRole) -> ItemData {
        let Some(item) = self.item(index) else {
            return ItemData::None;
        };

        match role {
            ItemRole::Display => ItemData::String(item.display_name()),
            ItemRole::Decoration => ItemData::String(item.icon()),
            ItemRole::Type => ItemData::String(item.item_type().as_str().to_string()),
            ItemRole::OriginalName => ItemData::String(item.original_name()),
            ItemRole::User(_) => ItemData::None,
        }
    }

    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
        if column >= self.column_count(parent) || row >= self.row_count(parent) {
            return ModelIndex::invalid();
        }

        let child = match self.item(parent) {
            Some(parent_item) => parent_item.child(row),
            None => self.roots.read().get(row).cloned(),
        };

        match child {
            Some(child) => self.create_index(&child, row, column),
            None => ModelIndex::invalid(),
        }
    }

    fn parent(&self, index: &ModelIndex) -> ModelIndex {
        let Some(parent) = self
            .item(index)
            .and_then(|item| item.parent())
            .and_then(|parent| parent.upgrade())
        else {
            return ModelIndex::invalid();
        };

        let row = self.position_of(&parent);
        self.create_index(&parent, row, 0)
    }

    fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    fn flags(&self, index: &ModelIndex) -> ItemFlags {
        match self.item(index) {
            Some(item) => ItemFlags::new().with_enabled(item.is_enabled()),
            None => ItemFlags::none(),
        }
    }

    fn can_fetch_more(&self, parent: &ModelIndex) -> bool {
        self.item(parent).is_some_and(|item| item.can_fetch_more())
    }

    fn fetch_more(&self, parent: &ModelIndex) {
        self.affinity.debug_assert_same_thread();
        if let Some(item) = self.item(parent) {
            item.fetch_more();
        }
    }
}

impl Drop for ConnectionsModel {
    fn drop(&mut self) {
        self.item_events.unlisten(self.listener);
    }
}

static_assertions::assert_impl_all!(ConnectionsModel: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LazyItem;
    use crate::model::item::TreeItem;
    use parking_lot::Mutex;

    fn server(model: &ConnectionsModel, name: &str) -> ItemRef {
        LazyItem::leaf(ItemType::Server, name, model.item_events())
    }

    #[test]
    fn test_parent_row_comes_from_owner_position() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let events = model.item_events();

        let db: ItemRef = LazyItem::builder(ItemType::Database, "db1", events.clone())
            .children(vec![LazyItem::leaf(ItemType::Key, "k", events.clone()) as ItemRef])
            .build();
        let first: ItemRef = LazyItem::leaf(ItemType::Database, "db0", events.clone());
        let local: ItemRef = LazyItem::builder(ItemType::Server, "local", events.clone())
            .children(vec![first, db.clone()])
            .build();
        model.add_root_item(server(&model, "other"));
        model.add_root_item(local.clone());

        local.set_row(9);
        db.set_row(5);

        let root = ModelIndex::invalid();
        let db_index = model.index(1, 0, &model.index(1, 0, &root));
        let key_index = model.index(0, 0, &db_index);
        assert_eq!(model.parent(&key_index).row(), 1);
        assert_eq!(model.parent(&db_index).row(), 1);
        assert_eq!(model.parent(&key_index), db_index);
    }

    #[test]
    fn test_empty_model() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let root = ModelIndex::invalid();
        assert_eq!(model.size(), 0);
        assert_eq!(model.row_count(&root), 0);
        assert_eq!(model.column_count(&root), 1);
        assert!(!model.index(0, 0, &root).is_valid());
    }

    #[test]
    fn test_add_root_items() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let brackets = Arc::new(Mutex::new(Vec::new()));

        let b = brackets.clone();
        model
            .signals()
            .rows_about_to_be_inserted
            .connect(move |(parent, first, last)| b.lock().push((parent.is_valid(), *first, *last)));

        model.add_root_item(server(&model, "a"));
        model.add_root_item(server(&model, "b"));

        assert_eq!(model.size(), 2);
        assert_eq!(*brackets.lock(), vec![(false, 0, 0), (false, 1, 1)]);

        let second = model.index(1, 0, &ModelIndex::invalid());
        assert_eq!(model.display_text(&second).as_deref(), Some("b"));
        assert_eq!(model.item(&second).unwrap().row(), 1);
    }

    #[test]
    fn test_add_same_root_twice() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let a = server(&model, "a");
        model.add_root_item(a.clone());
        model.add_root_item(a);
        assert_eq!(model.size(), 1);
    }

    #[test]
    fn test_out_of_range_index() {
        let model = ConnectionsModel::new(ModelConfig::default());
        model.add_root_item(server(&model, "a"));
        let root = ModelIndex::invalid();
        assert!(!model.index(1, 0, &root).is_valid());
        assert!(!model.index(0, 1, &root).is_valid());
    }

    #[test]
    fn test_data_roles() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let item = LazyItem::builder(ItemType::Server, "127.0.0.1:6379", model.item_events())
            .display_name("local")
            .icon("qrc:/images/server.svg")
            .build();
        model.add_root_item(item);

        let index = model.index(0, 0, &ModelIndex::invalid());
        assert_eq!(model.data(&index, ItemRole::Display).as_string(), Some("local"));
        assert_eq!(
            model.data(&index, ItemRole::OriginalName).as_string(),
            Some("127.0.0.1:6379")
        );
        assert_eq!(model.item_type(&index).as_string(), Some("server"));
        assert_eq!(
            model.item_icon(&index).as_string(),
            Some("qrc:/images/server.svg")
        );
        assert!(model.data(&index, ItemRole::User(0)).is_none());
    }

    #[test]
    fn test_flags() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let disabled = LazyItem::builder(ItemType::Server, "off", model.item_events())
            .enabled(false)
            .build();
        model.add_root_item(server(&model, "on"));
        model.add_root_item(disabled);

        let root = ModelIndex::invalid();
        assert_eq!(model.flags(&model.index(0, 0, &root)), ItemFlags::new());
        assert_eq!(
            model.flags(&model.index(1, 0, &root)),
            ItemFlags::new().with_enabled(false)
        );
        assert_eq!(model.flags(&root), ItemFlags::none());
    }

    #[test]
    fn test_metadata_and_events() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = received.clone();
        let item = LazyItem::builder(ItemType::Server, "local", model.item_events())
            .on_event(move |_item, event| r.lock().push(event.to_string()))
            .build();
        model.add_root_item(item);

        let index = model.index(0, 0, &ModelIndex::invalid());
        model.set_metadata(&index, "filter", ItemData::from("user:*"));
        assert_eq!(model.metadata(&index, "filter").as_string(), Some("user:*"));

        model.send_event(&index, "reload");
        model.send_event(&ModelIndex::invalid(), "ignored");
        assert_eq!(*received.lock(), vec!["reload".to_string()]);
    }

    #[test]
    fn test_role_names() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let names = model.role_names();
        assert_eq!(names.get(&ItemRole::Display), Some(&"name"));
        assert_eq!(names.get(&ItemRole::Type), Some(&"type"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_clear_resets_model() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let resets = Arc::new(Mutex::new(0));
        let r = resets.clone();
        model.signals().model_reset.connect(move |_| *r.lock() += 1);

        model.add_root_item(server(&model, "a"));
        let index = model.index(0, 0, &ModelIndex::invalid());
        model.clear();

        assert_eq!(model.size(), 0);
        assert_eq!(*resets.lock(), 1);
        assert!(model.item(&index).is_none());
    }

    #[test]
    fn test_changed_on_childless_node_is_suppressed() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let changes = Arc::new(Mutex::new(0));
        let c = changes.clone();
        model.signals().data_changed.connect(move |_| *c.lock() += 1);

        let events = model.item_events();
        let leaf = LazyItem::leaf(ItemType::Server, "empty", events.clone());
        let parent = LazyItem::builder(ItemType::Server, "full", events.clone())
            .children(vec![LazyItem::leaf(ItemType::Database, "db0", events) as ItemRef])
            .build();
        model.add_root_item(leaf.clone());
        model.add_root_item(parent.clone());

        leaf.rename("still empty");
        assert_eq!(*changes.lock(), 0);

        parent.rename("renamed");
        assert_eq!(*changes.lock(), 1);
    }

    #[test]
    fn test_events_from_detached_nodes_are_ignored() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let inserts = Arc::new(Mutex::new(0));
        let i = inserts.clone();
        model.signals().rows_inserted.connect(move |_| *i.lock() += 1);

        let events = model.item_events();
        let child_events = events.clone();
        let orphan = LazyItem::builder(ItemType::Server, "orphan", events)
            .loader(move |_item: ItemRef, completion: crate::model::LoadCompletion| {
                completion.finish(vec![LazyItem::leaf(ItemType::Database, "db0", child_events.clone()) as ItemRef]);
            })
            .build();

        orphan.fetch_more();
        assert_eq!(orphan.child_count(), 1);
        assert_eq!(*inserts.lock(), 0);
    }
}
