//! keytree - a lazy-loading connections tree model.
//!
//! Maps a tree of servers, databases, namespaces and keys, whose children are
//! fetched on demand, onto `(row, column, parent)` indices for a consumer
//! such as a tree view.
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
//! let db_events = events.clone();
//! let server = LazyItem::builder(ItemType::Server, "127.0.0.1:6379", events)
//!     .loader(move |_server: ItemRef, completion: LoadCompletion| {
//!         completion.finish(vec![LazyItem::leaf(ItemType::Database, "db0", db_events.clone()) as ItemRef]);
//!     })
//!     .build();
//! model.add_root_item(server);
//!
//! let root = model.index(0, 0, &ModelIndex::invalid());
//! model.fetch_more(&root);
//! assert_eq!(model.row_count(&root), 1);
//! ```

pub use keytree_core::*;

pub mod model;
pub mod settings;

/// Commonly used types.
pub mod prelude {
    pub use crate::model::{
        ChildLoader, ConnectionsModel, ItemData, ItemModel, ItemRef, ItemRole, ItemType,
        LazyItem, LoadCompletion, ModelConfig, ModelIndex, TreeItem,
    };
    pub use crate::settings::Settings;
    pub use keytree_core::{Dispatcher, Signal};
}
