//! The connections tree model.
//!
//! This module maps an evolving tree of lazily loaded nodes onto positional
//! `(row, column, parent)` indices.
//!
//! # Core Types
//!
//! - `ModelIndex`: Identifies an item's position in a model
//! - `ItemRole` / `ItemData`: Which attribute is requested, and its value
//! - `ItemModel`: The positional query surface
//! - `ModelSignals`: Row insert/remove brackets and data changes
//! - `TreeItem`: The node contract; `ItemCore` holds the shared node state
//! - `NodeRegistry`: Resolves index identities back to live nodes
//! - `LazyChildren` / `LoadCompletion` / `ChildLoader`: Lazy child loading
//! - `ExpansionTracker`: Reopens expanded namespaces after a reload
//! - `ConnectionsModel`: The model over server / database / namespace / key
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────┐ item events ┌──────────────────┐   signals   ┌──────────┐
//! │  TreeItem   │────────────>│ ConnectionsModel │────────────>│ Consumer │
//! │ (LazyItem)  │             │   (ItemModel)    │             │          │
//! └─────────────┘             └──────────────────┘             └──────────┘
//!       ^                        │           ^                      │
//!       │ weak                   v           └──── ModelIndex ──────┘
//!       └──────────────── NodeRegistry
//! ```
//!
//! Consumers query the model with `ModelIndex` and `ItemRole`. Nodes never
//! talk to consumers directly; they emit item events and the model turns them
//! into structural notifications.

mod connections_model;
mod debug;
mod expansion;
mod index;
mod item;
mod lazy_load;
mod registry;
mod role;
mod traits;

pub use connections_model::{ConnectionsModel, ModelConfig, REOPEN_NAMESPACES_KEY};
pub use debug::{ModelTreeDebug, ModelTreeDisplay, TreeFormatOptions, TreeStyle};
pub use expansion::ExpansionTracker;
pub use index::ModelIndex;
pub use item::{
    ItemCore, ItemEvent, ItemEventKind, ItemEventSender, ItemRef, ItemType, NodeId, TreeItem,
    WeakItemRef,
};
pub use lazy_load::{
    ChildLoader, LazyChildren, LazyItem, LazyItemBuilder, LoadCompletion, LoadState, LoadTarget,
};
pub use registry::NodeRegistry;
pub use role::{ItemData, ItemRole};
pub use traits::{ItemFlags, ItemModel, MatchFlags, ModelSignals};
