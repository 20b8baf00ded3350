//! The node contract and the state shared by node implementations.
//!
//! A tree is made of [`TreeItem`]s. Parents own their children through
//! [`ItemRef`] handles; the link back to the parent is a [`WeakItemRef`] and
//! never keeps the parent alive. Nodes report structural changes on an
//! [`ItemEventSender`] that the owning model listens to.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use keytree_core::{ConnectionId, ConnectionType, Signal};
use parking_lot::RwLock;

use super::role::ItemData;

/// Global counter for node identities.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a node.
///
/// Identities are never reused, so an id held after its node was dropped
/// simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocates a fresh identity.
    pub fn next() -> Self {
        Self(NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuilds an identity from the raw value stored in a model index.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a node in the connections tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemType {
    Server,
    Database,
    Namespace,
    Key,
    /// Any kind this crate has no special handling for.
    Other(String),
}

impl ItemType {
    /// Returns the type tag reported through [`ItemRole::Type`](super::ItemRole::Type).
    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Server => "server",
            ItemType::Database => "database",
            ItemType::Namespace => "namespace",
            ItemType::Key => "key",
            ItemType::Other(tag) => tag,
        }
    }
}

impl From<&str> for ItemType {
    fn from(tag: &str) -> Self {
        match tag {
            "server" => ItemType::Server,
            "database" => ItemType::Database,
            "namespace" => ItemType::Namespace,
            "key" => ItemType::Key,
            other => ItemType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owning handle to a node.
pub type ItemRef = Arc<dyn TreeItem>;

/// Non-owning handle to a node.
pub type WeakItemRef = Weak<dyn TreeItem>;

/// A node of the connections tree.
///
/// Implementations use interior mutability: the tree is shared between the
/// model and transient handles, and every mutation happens on the model's
/// control thread.
pub trait TreeItem: Send + Sync {
    /// Identity of this node.
    fn id(&self) -> NodeId;

    /// Name shown to the user.
    fn display_name(&self) -> String;

    /// The raw, unformatted name.
    fn original_name(&self) -> String;

    fn item_type(&self) -> ItemType;

    /// Icon reference.
    fn icon(&self) -> String;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Number of currently attached children.
    fn child_count(&self) -> usize;

    /// Child at `row`, if any.
    fn child(&self, row: usize) -> Option<ItemRef>;

    /// Parent node, or `None` for a root.
    fn parent(&self) -> Option<WeakItemRef>;

    /// Position of this node within its owner.
    fn row(&self) -> usize;

    fn set_row(&self, row: usize);

    fn set_parent(&self, parent: Option<WeakItemRef>);

    /// Returns `true` while children can still be requested.
    fn can_fetch_more(&self) -> bool {
        false
    }

    /// Starts loading children. Must return without waiting for them.
    fn fetch_more(&self) {}

    fn metadata(&self, key: &str) -> ItemData;

    fn set_metadata(&self, key: &str, value: ItemData);

    /// Handles a named user command.
    fn handle_event(&self, _event: &str) {}
}

/// Structural change reported by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEventKind {
    /// Attributes of the node changed.
    Changed,
    /// Children were attached; the count is the node's current child count.
    ChildrenLoaded,
    /// Children are about to be detached; sent while they are still attached.
    ChildrenUnloaded,
}

/// An event on the item event channel.
#[derive(Debug, Clone)]
pub struct ItemEvent {
    pub item: WeakItemRef,
    pub kind: ItemEventKind,
}

/// Shared sending side of the item event channel.
///
/// Clones refer to the same channel. A model hands its sender out through
/// `ConnectionsModel::item_events` and listens on it.
#[derive(Clone, Default)]
pub struct ItemEventSender {
    signal: Arc<Signal<ItemEvent>>,
}

impl ItemEventSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends an event to every listener.
    pub fn send(&self, item: WeakItemRef, kind: ItemEventKind) {
        self.signal.emit(ItemEvent { item, kind });
    }

    pub fn changed(&self, item: WeakItemRef) {
        self.send(item, ItemEventKind::Changed);
    }

    pub fn children_loaded(&self, item: WeakItemRef) {
        self.send(item, ItemEventKind::ChildrenLoaded);
    }

    pub fn children_unloaded(&self, item: WeakItemRef) {
        self.send(item, ItemEventKind::ChildrenUnloaded);
    }

    /// Registers a listener with the given connection type.
    pub fn listen<F>(&self, listener: F, connection_type: ConnectionType) -> ConnectionId
    where
        F: Fn(&ItemEvent) + Send + Sync + 'static,
    {
        self.signal.connect_with_type(listener, connection_type)
    }

    pub fn unlisten(&self, id: ConnectionId) -> bool {
        self.signal.disconnect(id)
    }

    /// Returns `true` if both senders feed the same channel.
    pub fn same_channel(&self, other: &ItemEventSender) -> bool {
        Arc::ptr_eq(&self.signal, &other.signal)
    }
}

impl fmt::Debug for ItemEventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemEventSender")
            .field("listeners", &self.signal.connection_count())
            .finish()
    }
}

/// Attribute state shared by node implementations.
///
/// Embed it in a node type and forward the matching [`TreeItem`] methods to
/// it. Children are not part of the core; see
/// [`LazyChildren`](super::LazyChildren).
pub struct ItemCore {
    id: NodeId,
    item_type: ItemType,
    original_name: String,
    display_name: RwLock<String>,
    icon: RwLock<String>,
    enabled: AtomicBool,
    row: AtomicUsize,
    parent: RwLock<Option<WeakItemRef>>,
    metadata: RwLock<HashMap<String, ItemData>>,
    events: ItemEventSender,
}

impl ItemCore {
    /// Creates state for a node named `name`, reporting on `events`.
    ///
    /// The display name starts out equal to `name`.
    pub fn new(item_type: ItemType, name: impl Into<String>, events: ItemEventSender) -> Self {
        let name = name.into();
        Self {
            id: NodeId::next(),
            item_type,
            display_name: RwLock::new(name.clone()),
            original_name: name,
            icon: RwLock::new(String::new()),
            enabled: AtomicBool::new(true),
            row: AtomicUsize::new(0),
            parent: RwLock::new(None),
            metadata: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn with_display_name(self, display_name: impl Into<String>) -> Self {
        *self.display_name.write() = display_name.into();
        self
    }

    pub fn with_icon(self, icon: impl Into<String>) -> Self {
        *self.icon.write() = icon.into();
        self
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.enabled.store(enabled, Ordering::Relaxed);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type.clone()
    }

    pub fn original_name(&self) -> String {
        self.original_name.clone()
    }

    pub fn display_name(&self) -> String {
        self.display_name.read().clone()
    }

    pub fn set_display_name(&self, display_name: impl Into<String>) {
        *self.display_name.write() = display_name.into();
    }

    pub fn icon(&self) -> String {
        self.icon.read().clone()
    }

    pub fn set_icon(&self, icon: impl Into<String>) {
        *self.icon.write() = icon.into();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn row(&self) -> usize {
        self.row.load(Ordering::Relaxed)
    }

    pub fn set_row(&self, row: usize) {
        self.row.store(row, Ordering::Relaxed);
    }

    pub fn parent(&self) -> Option<WeakItemRef> {
        self.parent.read().clone()
    }

    pub fn set_parent(&self, parent: Option<WeakItemRef>) {
        *self.parent.write() = parent;
    }

    /// Metadata under `key`, or [`ItemData::None`].
    pub fn metadata(&self, key: &str) -> ItemData {
        self.metadata.read().get(key).cloned().unwrap_or_default()
    }

    /// Stores metadata; storing [`ItemData::None`] removes the key.
    pub fn set_metadata(&self, key: &str, value: ItemData) {
        let mut metadata = self.metadata.write();
        if value.is_none() {
            metadata.remove(key);
        } else {
            metadata.insert(key.to_string(), value);
        }
    }

    /// The channel this node reports on.
    pub fn events(&self) -> &ItemEventSender {
        &self.events
    }
}

impl fmt::Debug for ItemCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemCore")
            .field("id", &self.id)
            .field("item_type", &self.item_type)
            .field("original_name", &self.original_name)
            .field("row", &self.row())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(ItemCore: Send, Sync);
static_assertions::assert_impl_all!(ItemEventSender: Send, Sync);
