//! Model index for addressing items in a model.
//!
//! A `ModelIndex` is a `(row, column, internal id)` triple. It never owns the
//! item it points at: the model resolves the internal id back to a node on
//! every access, and an index whose node has gone away simply resolves to
//! nothing.

use std::hash::{Hash, Hasher};

use super::item::NodeId;

/// Represents a position within an `ItemModel`.
///
/// # Index Validity
///
/// Indices should be used immediately and not stored long-term. After rows
/// are inserted or removed the row of a stored index may be stale, and after
/// its node is destroyed it resolves to no item at all.
///
/// # Example
///
/// ```ignore
/// use keytree::model::ModelIndex;
///
/// let server = model.index(0, 0, &ModelIndex::invalid());
/// let first_db = model.index(0, 0, &server);
/// assert_eq!(model.parent(&first_db), server);
/// ```
#[derive(Clone, Copy)]
pub struct ModelIndex {
    row: usize,
    column: usize,
    /// Model-specific identifier of the addressed item.
    internal_id: u64,
    valid: bool,
}

impl Default for ModelIndex {
    fn default() -> Self {
        Self::invalid()
    }
}

impl ModelIndex {
    /// Creates an invalid (null) model index.
    ///
    /// An invalid index is used to represent:
    /// - The root of the model (as a parent reference)
    /// - A non-existent or out-of-bounds item
    #[inline]
    pub const fn invalid() -> Self {
        Self {
            row: 0,
            column: 0,
            internal_id: 0,
            valid: false,
        }
    }

    /// Creates a new valid model index.
    ///
    /// Models call this from `index`/`parent`; consumers normally never do.
    #[inline]
    pub const fn new(row: usize, column: usize, internal_id: u64) -> Self {
        Self {
            row,
            column,
            internal_id,
            valid: true,
        }
    }

    /// Returns `true` if this is a valid index.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns the row of this index within its parent.
    ///
    /// Returns 0 for invalid indices.
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    /// Returns the column of this index within its parent.
    ///
    /// Returns 0 for invalid indices.
    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Returns the internal ID associated with this index.
    #[inline]
    pub fn internal_id(&self) -> u64 {
        self.internal_id
    }

    /// The node this index addresses, or `None` for an invalid index.
    #[inline]
    pub fn node_id(&self) -> Option<NodeId> {
        self.valid.then(|| NodeId::from_raw(self.internal_id))
    }
}

impl std::fmt::Debug for ModelIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            f.debug_struct("ModelIndex")
                .field("row", &self.row)
                .field("column", &self.column)
                .field("internal_id", &self.internal_id)
                .finish()
        } else {
            write!(f, "ModelIndex(invalid)")
        }
    }
}

impl PartialEq for ModelIndex {
    fn eq(&self, other: &Self) -> bool {
        match (self.valid, other.valid) {
            (false, false) => true,
            (true, true) => {
                self.row == other.row
                    && self.column == other.column
                    && self.internal_id == other.internal_id
            }
            _ => false,
        }
    }
}

impl Eq for ModelIndex {}

impl Hash for ModelIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.valid.hash(state);
        if self.valid {
            self.row.hash(state);
            self.column.hash(state);
            self.internal_id.hash(state);
        }
    }
}
