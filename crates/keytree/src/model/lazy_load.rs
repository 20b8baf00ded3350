//! Lazy child loading.
//!
//! A node starts out [`LoadState::NotLoaded`]. When a consumer asks the model
//! to fetch more, the node hands itself and a [`LoadCompletion`] to its
//! [`ChildLoader`] and returns at once. The loader finishes the completion
//! whenever the children are known, from any thread. Completions from other
//! threads are posted to the control thread's
//! [`Dispatcher`](keytree_core::Dispatcher) and applied only when that thread
//! drains its queue; a completion whose node is gone by then is discarded.
//!
//! Every fetch gets a new load generation, and so does every unload. A
//! completion carries the generation it was issued for and is ignored once
//! that generation is no longer current, so a late result from a load that
//! was superseded by a reload never overwrites the newer one.
//!
//! Applying children goes through [`LazyChildren::attach`], which emits
//! [`ItemEventKind::ChildrenLoaded`](super::ItemEventKind::ChildrenLoaded)
//! after the children are in place. [`LazyChildren::unload`] emits
//! `ChildrenUnloaded` while they are still attached.
//!
//! # Example
//!
//! ```
//! use keytree::model::{
//!     ConnectionsModel, ItemModel, ItemRef, ItemType, LazyItem, LoadCompletion, ModelConfig,
//!     ModelIndex,
//! };
//!
//! let model = ConnectionsModel::new(ModelConfig::default());
//! let events = model.item_events();
//!
//! let key_events = events.clone();
//! let server = LazyItem::builder(ItemType::Server, "local", events)
//!     .loader(move |_item: ItemRef, completion: LoadCompletion| {
//!         completion.finish(vec![LazyItem::leaf(ItemType::Key, "greeting", key_events.clone())]);
//!     })
//!     .build();
//! model.add_root_item(server);
//!
//! let root = model.index(0, 0, &ModelIndex::invalid());
//! assert!(model.can_fetch_more(&root));
//! model.fetch_more(&root);
//! assert_eq!(model.row_count(&root), 1);
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use keytree_core::dispatcher;
use keytree_core::invocation::QueuedInvocation;
use keytree_core::logging::targets;
use keytree_core::ThreadAffinity;
use parking_lot::RwLock;

use super::item::{
    ItemCore, ItemEventSender, ItemRef, ItemType, NodeId, TreeItem, WeakItemRef,
};
use super::role::ItemData;

/// Loading progress of a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Children were never requested, or were unloaded.
    #[default]
    NotLoaded,
    /// A load is in flight.
    Loading,
    /// Children are attached.
    Loaded,
}

/// Source of a node's children.
///
/// `load` must not block on the result; it either finishes the completion
/// right away or arranges for it to be finished later.
pub trait ChildLoader: Send + Sync {
    fn load(&self, item: ItemRef, completion: LoadCompletion);
}

impl<F> ChildLoader for F
where
    F: Fn(ItemRef, LoadCompletion) + Send + Sync,
{
    fn load(&self, item: ItemRef, completion: LoadCompletion) {
        self(item, completion)
    }
}

/// A node that can receive the outcome of a load.
///
/// `generation` is the value [`LazyChildren::begin_fetch`] returned when the
/// load started; implementations drop outcomes for generations that are no
/// longer current.
pub trait LoadTarget: Send + Sync {
    /// Applies loaded children. Runs on the control thread.
    fn finish_load(&self, generation: u64, children: Vec<ItemRef>);

    /// Reports a failed load. Runs on the control thread.
    fn fail_load(&self, generation: u64, reason: &str);
}

enum Outcome {
    Loaded(Vec<ItemRef>),
    Failed(String),
}

struct Pending {
    target: Weak<dyn LoadTarget>,
    node: NodeId,
    generation: u64,
    control: ThreadAffinity,
}

impl Pending {
    fn deliver(self, outcome: Outcome) {
        let Pending {
            target,
            node,
            generation,
            control,
        } = self;

        let apply = move || {
            let Some(target) = target.upgrade() else {
                tracing::trace!(target: targets::LAZY_LOAD, %node, "node is gone, completion discarded");
                return;
            };
            match outcome {
                Outcome::Loaded(children) => target.finish_load(generation, children),
                Outcome::Failed(reason) => target.fail_load(generation, &reason),
            }
        };

        if control.is_same_thread() {
            apply();
            return;
        }

        if let Err(err) = dispatcher::post_to(control.thread_id(), QueuedInvocation::new(apply)) {
            tracing::warn!(
                target: targets::LAZY_LOAD,
                %node,
                error = %err,
                "control thread unreachable, completion dropped"
            );
        }
    }
}

/// One-shot handle through which a loader reports its result.
///
/// The completion refers to its node weakly and remembers the thread that
/// started the load. Dropping it unfinished counts as a failure.
pub struct LoadCompletion {
    pending: Option<Pending>,
}

impl LoadCompletion {
    /// Creates a completion for load `generation` of `target`, bound to the
    /// calling thread.
    pub fn new(target: Weak<dyn LoadTarget>, node: NodeId, generation: u64) -> Self {
        Self::with_control(target, node, generation, ThreadAffinity::current())
    }

    /// Creates a completion that is applied on `control`'s thread.
    pub fn with_control(
        target: Weak<dyn LoadTarget>,
        node: NodeId,
        generation: u64,
        control: ThreadAffinity,
    ) -> Self {
        Self {
            pending: Some(Pending {
                target,
                node,
                generation,
                control,
            }),
        }
    }

    /// Identity of the node being loaded.
    pub fn node(&self) -> Option<NodeId> {
        self.pending.as_ref().map(|pending| pending.node)
    }

    /// Load generation this completion answers.
    pub fn generation(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.generation)
    }

    /// Delivers the loaded children.
    pub fn finish(mut self, children: Vec<ItemRef>) {
        if let Some(pending) = self.pending.take() {
            pending.deliver(Outcome::Loaded(children));
        }
    }

    /// Reports that loading failed; the node returns to `NotLoaded`.
    pub fn fail(mut self, reason: impl Into<String>) {
        if let Some(pending) = self.pending.take() {
            pending.deliver(Outcome::Failed(reason.into()));
        }
    }
}

impl Drop for LoadCompletion {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.deliver(Outcome::Failed("loader dropped its completion".to_string()));
        }
    }
}

impl fmt::Debug for LoadCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCompletion")
            .field("node", &self.node())
            .field("generation", &self.generation())
            .finish()
    }
}

#[derive(Clone, Copy)]
struct Progress {
    state: LoadState,
    generation: u64,
}

impl Progress {
    const fn new(state: LoadState) -> Self {
        Self {
            state,
            generation: 0,
        }
    }
}

/// Ordered children of a node plus their load state.
pub struct LazyChildren {
    progress: RwLock<Progress>,
    children: RwLock<Vec<ItemRef>>,
}

impl Default for LazyChildren {
    fn default() -> Self {
        Self::new()
    }
}

impl LazyChildren {
    /// No children yet; they can be fetched.
    pub fn new() -> Self {
        Self {
            progress: RwLock::new(Progress::new(LoadState::NotLoaded)),
            children: RwLock::new(Vec::new()),
        }
    }

    /// Children known up front. Nothing is emitted.
    pub fn preloaded(parent: &WeakItemRef, children: Vec<ItemRef>) -> Self {
        adopt(parent, &children);
        Self {
            progress: RwLock::new(Progress::new(LoadState::Loaded)),
            children: RwLock::new(children),
        }
    }

    pub fn state(&self) -> LoadState {
        self.progress.read().state
    }

    /// Generation of the most recent fetch or unload.
    pub fn generation(&self) -> u64 {
        self.progress.read().generation
    }

    /// Returns `true` while load `generation` is the one in flight.
    pub fn is_current(&self, generation: u64) -> bool {
        let progress = self.progress.read();
        progress.state == LoadState::Loading && progress.generation == generation
    }

    pub fn can_fetch_more(&self) -> bool {
        self.state() == LoadState::NotLoaded
    }

    /// Moves `NotLoaded` to `Loading` and returns the new load generation.
    ///
    /// Returns `None` if a load is already running or the children are
    /// attached.
    pub fn begin_fetch(&self) -> Option<u64> {
        let mut progress = self.progress.write();
        if progress.state != LoadState::NotLoaded {
            return None;
        }
        progress.state = LoadState::Loading;
        progress.generation += 1;
        Some(progress.generation)
    }

    pub fn len(&self) -> usize {
        self.children.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, row: usize) -> Option<ItemRef> {
        self.children.read().get(row).cloned()
    }

    /// Clones the current child handles.
    pub fn snapshot(&self) -> Vec<ItemRef> {
        self.children.read().clone()
    }

    /// Attaches `children` under `parent` and emits `ChildrenLoaded`.
    ///
    /// Children already attached are unloaded first.
    pub fn attach(&self, parent: &WeakItemRef, children: Vec<ItemRef>, events: &ItemEventSender) {
        if !self.is_empty() {
            self.unload(parent, events);
        }

        adopt(parent, &children);
        let count = children.len();
        *self.children.write() = children;
        self.progress.write().state = LoadState::Loaded;

        tracing::debug!(target: targets::LAZY_LOAD, count, "children attached");
        events.children_loaded(parent.clone());
    }

    /// Returns to `NotLoaded` after a failed load.
    pub fn fail(&self, node: NodeId, reason: &str) {
        self.progress.write().state = LoadState::NotLoaded;
        tracing::warn!(target: targets::LAZY_LOAD, %node, reason, "loading children failed");
    }

    /// Emits `ChildrenUnloaded`, then detaches every child.
    ///
    /// With no children attached nothing is emitted. A load still in flight
    /// is superseded.
    pub fn unload(&self, parent: &WeakItemRef, events: &ItemEventSender) {
        if !self.is_empty() {
            events.children_unloaded(parent.clone());
        }

        let removed = std::mem::take(&mut *self.children.write());
        {
            let mut progress = self.progress.write();
            progress.state = LoadState::NotLoaded;
            progress.generation += 1;
        }
        for child in &removed {
            child.set_parent(None);
        }
        tracing::debug!(target: targets::LAZY_LOAD, count = removed.len(), "children detached");
    }

    /// Inserts `child` at `row` (clamped to the end) and renumbers the
    /// following siblings.
    ///
    /// This is bookkeeping only; nothing is emitted.
    pub fn insert_child(&self, parent: &WeakItemRef, row: usize, child: ItemRef) {
        let mut children = self.children.write();
        let row = row.min(children.len());
        child.set_parent(Some(parent.clone()));
        children.insert(row, child);
        renumber(&children, row);
    }

    /// Removes the child with `id` and renumbers the following siblings.
    ///
    /// Returns the removed child. Nothing is emitted.
    pub fn remove_child(&self, id: NodeId) -> Option<ItemRef> {
        let mut children = self.children.write();
        let row = children.iter().position(|child| child.id() == id)?;
        let child = children.remove(row);
        renumber(&children, row);
        drop(children);
        child.set_parent(None);
        Some(child)
    }
}

impl fmt::Debug for LazyChildren {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyChildren")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("len", &self.len())
            .finish()
    }
}

fn adopt(parent: &WeakItemRef, children: &[ItemRef]) {
    for (row, child) in children.iter().enumerate() {
        child.set_row(row);
        child.set_parent(Some(parent.clone()));
    }
}

fn renumber(children: &[ItemRef], from: usize) {
    for (row, child) in children.iter().enumerate().skip(from) {
        child.set_row(row);
    }
}

type EventHandler = Box<dyn Fn(&LazyItem, &str) + Send + Sync>;

/// General-purpose lazily loaded node.
///
/// Covers nodes that need nothing beyond attributes, a loader and an optional
/// command handler. Build one with [`LazyItem::builder`] or
/// [`LazyItem::leaf`].
pub struct LazyItem {
    this: Weak<LazyItem>,
    core: ItemCore,
    children: LazyChildren,
    loader: Option<Arc<dyn ChildLoader>>,
    on_event: Option<EventHandler>,
}

impl LazyItem {
    pub fn builder(item_type: ItemType, name: impl Into<String>, events: ItemEventSender) -> LazyItemBuilder {
        LazyItemBuilder {
            core: ItemCore::new(item_type, name, events),
            loader: None,
            children: None,
            on_event: None,
        }
    }

    /// A node with no children and nothing to fetch.
    pub fn leaf(item_type: ItemType, name: impl Into<String>, events: ItemEventSender) -> Arc<Self> {
        Self::builder(item_type, name, events).build()
    }

    /// Weak handle to this node.
    pub fn handle(&self) -> WeakItemRef {
        self.this.clone()
    }

    pub fn core(&self) -> &ItemCore {
        &self.core
    }

    pub fn children(&self) -> &LazyChildren {
        &self.children
    }

    pub fn load_state(&self) -> LoadState {
        self.children.state()
    }

    /// Changes the display name and emits `Changed`.
    pub fn rename(&self, display_name: impl Into<String>) {
        self.core.set_display_name(display_name);
        self.core.events().changed(self.handle());
    }

    /// Detaches the children so they are fetched again on the next request.
    pub fn unload(&self) {
        self.children.unload(&self.handle(), self.core.events());
    }

    /// Unloads, then starts a new fetch.
    pub fn reload(&self) {
        self.unload();
        self.fetch_more();
    }
}

impl TreeItem for LazyItem {
    fn id(&self) -> NodeId {
        self.core.id()
    }

    fn display_name(&self) -> String {
        self.core.display_name()
    }

    fn original_name(&self) -> String {
        self.core.original_name()
    }

    fn item_type(&self) -> ItemType {
        self.core.item_type()
    }

    fn icon(&self) -> String {
        self.core.icon()
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child(&self, row: usize) -> Option<ItemRef> {
        self.children.get(row)
    }

    fn parent(&self) -> Option<WeakItemRef> {
        self.core.parent()
    }

    fn row(&self) -> usize {
        self.core.row()
    }

    fn set_row(&self, row: usize) {
        self.core.set_row(row);
    }

    fn set_parent(&self, parent: Option<WeakItemRef>) {
        self.core.set_parent(parent);
    }

    fn can_fetch_more(&self) -> bool {
        self.loader.is_some() && self.children.can_fetch_more()
    }

    fn fetch_more(&self) {
        let Some(loader) = self.loader.clone() else {
            return;
        };
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let Some(generation) = self.children.begin_fetch() else {
            return;
        };

        tracing::debug!(target: targets::LAZY_LOAD, node = %self.id(), generation, "fetching children");
        let target: Weak<dyn LoadTarget> = self.this.clone();
        loader.load(this, LoadCompletion::new(target, self.id(), generation));
    }

    fn metadata(&self, key: &str) -> ItemData {
        self.core.metadata(key)
    }

    fn set_metadata(&self, key: &str, value: ItemData) {
        self.core.set_metadata(key, value);
    }

    fn handle_event(&self, event: &str) {
        match &self.on_event {
            Some(handler) => handler(self, event),
            None => {
                tracing::debug!(target: targets::MODEL, node = %self.id(), event, "event not handled")
            }
        }
    }
}

impl LoadTarget for LazyItem {
    fn finish_load(&self, generation: u64, children: Vec<ItemRef>) {
        if !self.children.is_current(generation) {
            tracing::trace!(target: targets::LAZY_LOAD, node = %self.id(), generation, "stale completion ignored");
            return;
        }
        self.children.attach(&self.handle(), children, self.core.events());
    }

    fn fail_load(&self, generation: u64, reason: &str) {
        if !self.children.is_current(generation) {
            tracing::trace!(target: targets::LAZY_LOAD, node = %self.id(), generation, "stale failure ignored");
            return;
        }
        self.children.fail(self.id(), reason);
    }
}

impl fmt::Debug for LazyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyItem")
            .field("core", &self.core)
            .field("children", &self.children)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

/// Builder for [`LazyItem`].
pub struct LazyItemBuilder {
    core: ItemCore,
    loader: Option<Arc<dyn ChildLoader>>,
    children: Option<Vec<ItemRef>>,
    on_event: Option<EventHandler>,
}

impl LazyItemBuilder {
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.core = self.core.with_display_name(display_name);
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.core = self.core.with_icon(icon);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.core = self.core.with_enabled(enabled);
        self
    }

    /// Children are fetched through `loader`.
    pub fn loader(mut self, loader: impl ChildLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Children known up front; the node starts out loaded.
    pub fn children(mut self, children: Vec<ItemRef>) -> Self {
        self.children = Some(children);
        self
    }

    /// Handler for [`TreeItem::handle_event`].
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LazyItem, &str) + Send + Sync + 'static,
    {
        self.on_event = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Arc<LazyItem> {
        let LazyItemBuilder {
            core,
            loader,
            children,
            on_event,
        } = self;

        Arc::new_cyclic(|this: &Weak<LazyItem>| {
            let handle: WeakItemRef = this.clone();
            let children = match (children, &loader) {
                (Some(children), _) => LazyChildren::preloaded(&handle, children),
                (None, Some(_)) => LazyChildren::new(),
                (None, None) => LazyChildren::preloaded(&handle, Vec::new()),
            };
            LazyItem {
                this: this.clone(),
                core,
                children,
                loader,
                on_event,
            }
        })
    }
}

static_assertions::assert_impl_all!(LazyItem: Send, Sync);
static_assertions::assert_impl_all!(LoadCompletion: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemEventKind;
    use keytree_core::{ConnectionType, Dispatcher};
    use parking_lot::Mutex;

    fn record(events: &ItemEventSender) -> Arc<Mutex<Vec<(ItemEventKind, usize)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        events.listen(
            move |event| {
                let count = event.item.upgrade().map_or(0, |item| item.child_count());
                s.lock().push((event.kind, count));
            },
            ConnectionType::Direct,
        );
        seen
    }

    fn keys(events: &ItemEventSender, names: &[&str]) -> Vec<ItemRef> {
        names
            .iter()
            .map(|name| LazyItem::leaf(ItemType::Key, *name, events.clone()) as ItemRef)
            .collect()
    }

    #[test]
    fn test_begin_fetch_transitions() {
        let children = LazyChildren::new();
        assert!(children.can_fetch_more());
        let generation = children.begin_fetch().unwrap();
        assert_eq!(children.state(), LoadState::Loading);
        assert!(children.is_current(generation));
        assert!(children.begin_fetch().is_none());
        assert!(!children.can_fetch_more());

        let parent: WeakItemRef = Weak::<LazyItem>::new();
        children.unload(&parent, &ItemEventSender::new());
        assert!(!children.is_current(generation));
        assert!(children.begin_fetch().unwrap() > generation);
    }

    #[test]
    fn test_leaf_cannot_fetch() {
        let leaf = LazyItem::leaf(ItemType::Key, "k", ItemEventSender::new());
        assert!(!leaf.can_fetch_more());
        assert_eq!(leaf.load_state(), LoadState::Loaded);
        leaf.fetch_more();
        assert_eq!(leaf.child_count(), 0);
    }

    #[test]
    fn test_synchronous_load() {
        let events = ItemEventSender::new();
        let seen = record(&events);

        let child_events = events.clone();
        let db = LazyItem::builder(ItemType::Database, "db0", events)
            .loader(move |_item: ItemRef, completion: LoadCompletion| {
                completion.finish(keys(&child_events, &["a", "b", "c"]));
            })
            .build();

        assert!(db.can_fetch_more());
        db.fetch_more();

        assert_eq!(db.load_state(), LoadState::Loaded);
        assert_eq!(db.child_count(), 3);
        assert_eq!(*seen.lock(), vec![(ItemEventKind::ChildrenLoaded, 3)]);

        for row in 0..3 {
            let child = db.child(row).unwrap();
            assert_eq!(child.row(), row);
            let parent = child.parent().and_then(|p| p.upgrade()).unwrap();
            assert_eq!(parent.id(), db.id());
        }
    }

    #[test]
    fn test_unload_notifies_before_detaching() {
        let events = ItemEventSender::new();
        let server = LazyItem::builder(ItemType::Server, "local", events.clone())
            .children(keys(&events, &["db0", "db1"]))
            .build();
        let seen = record(&events);

        let detached = server.child(0).unwrap();
        server.unload();

        assert_eq!(*seen.lock(), vec![(ItemEventKind::ChildrenUnloaded, 2)]);
        assert_eq!(server.child_count(), 0);
        assert!(!server.can_fetch_more());
        assert_eq!(server.load_state(), LoadState::NotLoaded);
        assert!(detached.parent().is_none());
    }

    #[test]
    fn test_unload_empty_is_silent() {
        let events = ItemEventSender::new();
        let seen = record(&events);
        let children = LazyChildren::new();
        let parent: WeakItemRef = Weak::<LazyItem>::new();
        children.unload(&parent, &events);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_failed_load_can_retry() {
        let attempts = Arc::new(Mutex::new(0));
        let a = attempts.clone();
        let ns = LazyItem::builder(ItemType::Namespace, "users", ItemEventSender::new())
            .loader(move |_item: ItemRef, completion: LoadCompletion| {
                *a.lock() += 1;
                completion.fail("connection refused");
            })
            .build();

        ns.fetch_more();
        assert_eq!(ns.load_state(), LoadState::NotLoaded);
        assert!(ns.can_fetch_more());
        ns.fetch_more();
        assert_eq!(*attempts.lock(), 2);
    }

    #[test]
    fn test_dropped_completion_counts_as_failure() {
        let ns = LazyItem::builder(ItemType::Namespace, "users", ItemEventSender::new())
            .loader(|_item: ItemRef, completion: LoadCompletion| drop(completion))
            .build();

        ns.fetch_more();
        assert_eq!(ns.load_state(), LoadState::NotLoaded);
    }

    #[test]
    fn test_cross_thread_completion_waits_for_dispatcher() {
        let dispatcher = Dispatcher::for_current_thread();
        let events = ItemEventSender::new();
        let seen = record(&events);

        let child_events = events.clone();
        let db = LazyItem::builder(ItemType::Database, "db0", events)
            .loader(move |_item: ItemRef, completion: LoadCompletion| {
                let child_events = child_events.clone();
                std::thread::spawn(move || {
                    completion.finish(keys(&child_events, &["a", "b"]));
                })
                .join()
                .unwrap();
            })
            .build();

        db.fetch_more();
        assert_eq!(db.load_state(), LoadState::Loading);
        assert_eq!(db.child_count(), 0);
        assert!(seen.lock().is_empty());

        assert_eq!(dispatcher.process_pending().unwrap(), 1);
        assert_eq!(db.child_count(), 2);
        assert_eq!(*seen.lock(), vec![(ItemEventKind::ChildrenLoaded, 2)]);
    }

    #[test]
    fn test_completion_for_dropped_node_is_discarded() {
        let dispatcher = Dispatcher::for_current_thread();
        let events = ItemEventSender::new();
        let seen = record(&events);
        let parked = Arc::new(Mutex::new(None));

        let p = parked.clone();
        let db = LazyItem::builder(ItemType::Database, "db0", events.clone())
            .loader(move |_item: ItemRef, completion: LoadCompletion| {
                *p.lock() = Some(completion);
            })
            .build();

        db.fetch_more();
        drop(db);

        let completion = parked.lock().take().unwrap();
        let children = keys(&events, &["a"]);
        std::thread::spawn(move || completion.finish(children))
            .join()
            .unwrap();

        assert_eq!(dispatcher.process_pending().unwrap(), 1);
        assert!(seen.lock().is_empty());
    }

    fn parked_database(events: &ItemEventSender) -> (Arc<LazyItem>, Arc<Mutex<Vec<LoadCompletion>>>) {
        let parked = Arc::new(Mutex::new(Vec::new()));
        let p = parked.clone();
        let db = LazyItem::builder(ItemType::Database, "db0", events.clone())
            .loader(move |_item: ItemRef, completion: LoadCompletion| {
                p.lock().push(completion);
            })
            .build();
        (db, parked)
    }

    #[test]
    fn test_reload_ignores_late_result_of_superseded_load() {
        let events = ItemEventSender::new();
        let (db, parked) = parked_database(&events);

        db.fetch_more();
        db.reload();
        let (first, second) = {
            let mut parked = parked.lock();
            assert_eq!(parked.len(), 2);
            let second = parked.pop().unwrap();
            (parked.pop().unwrap(), second)
        };
        assert!(first.generation() < second.generation());

        first.finish(keys(&events, &["old"]));
        assert_eq!(db.load_state(), LoadState::Loading);
        assert_eq!(db.child_count(), 0);

        second.finish(keys(&events, &["new"]));
        assert_eq!(db.load_state(), LoadState::Loaded);
        assert_eq!(db.child_count(), 1);
        assert_eq!(db.child(0).unwrap().original_name(), "new");
    }

    #[test]
    fn test_reload_ignores_late_failure_of_superseded_load() {
        let events = ItemEventSender::new();
        let seen = record(&events);
        let (db, parked) = parked_database(&events);

        db.fetch_more();
        db.reload();
        let (first, second) = {
            let mut parked = parked.lock();
            let second = parked.pop().unwrap();
            (parked.pop().unwrap(), second)
        };

        first.fail("timed out");
        assert_eq!(db.load_state(), LoadState::Loading);

        second.finish(keys(&events, &["fresh"]));
        assert_eq!(db.load_state(), LoadState::Loaded);
        assert_eq!(db.child_count(), 1);
        assert_eq!(*seen.lock(), vec![(ItemEventKind::ChildrenLoaded, 1)]);
    }

    #[test]
    fn test_completion_after_unload_is_ignored() {
        let events = ItemEventSender::new();
        let (db, parked) = parked_database(&events);

        db.fetch_more();
        db.unload();
        let completion = parked.lock().pop().unwrap();
        completion.finish(keys(&events, &["a"]));

        assert_eq!(db.load_state(), LoadState::NotLoaded);
        assert_eq!(db.child_count(), 0);
        assert!(db.can_fetch_more());
    }

    #[test]
    fn test_insert_and_remove_renumber() {
        let events = ItemEventSender::new();
        let server = LazyItem::builder(ItemType::Server, "local", events.clone())
            .children(keys(&events, &["a", "c"]))
            .build();

        let b = LazyItem::leaf(ItemType::Key, "b", events.clone());
        server.children().insert_child(&server.handle(), 1, b.clone());

        let names: Vec<_> = server
            .children()
            .snapshot()
            .iter()
            .map(|child| (child.original_name(), child.row()))
            .collect();
        assert_eq!(
            names,
            vec![("a".into(), 0), ("b".into(), 1), ("c".into(), 2)]
        );

        let first = server.child(0).unwrap();
        let removed = server.children().remove_child(first.id()).unwrap();
        assert!(removed.parent().is_none());
        assert_eq!(b.row(), 0);
        assert_eq!(server.child(1).unwrap().row(), 1);
        assert!(server.children().remove_child(first.id()).is_none());
    }

    #[test]
    fn test_event_handler() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = received.clone();
        let key = LazyItem::builder(ItemType::Key, "k", ItemEventSender::new())
            .on_event(move |item, event| {
                r.lock().push((item.original_name(), event.to_string()));
            })
            .build();

        key.handle_event("delete");
        assert_eq!(*received.lock(), vec![("k".to_string(), "delete".to_string())]);
    }
}
