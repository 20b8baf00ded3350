//! Core traits for the model layer.
//!
//! This module defines the query surface a consumer uses to walk a model by
//! position, and the signals a model emits when its structure changes.

use keytree_core::Signal;

use super::index::ModelIndex;
use super::role::{ItemData, ItemRole};

/// Flags indicating what a consumer may do with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemFlags {
    /// Item can be selected.
    pub selectable: bool,
    /// Item is enabled (can interact).
    pub enabled: bool,
}

impl ItemFlags {
    /// Creates flags for a selectable, enabled item.
    pub fn new() -> Self {
        Self {
            selectable: true,
            enabled: true,
        }
    }

    /// Creates empty flags (nothing allowed).
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the selectable flag.
    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Options for [`ItemModel::match_items`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchFlags {
    /// Compare whole strings; otherwise the value only has to be contained.
    pub exact: bool,
    /// Compare with case; otherwise both sides are lowercased first.
    pub case_sensitive: bool,
    /// Descend into the children of every visited item.
    pub recursive: bool,
}

impl MatchFlags {
    /// Substring, case-insensitive, single level.
    pub const fn new() -> Self {
        Self {
            exact: false,
            case_sensitive: false,
            recursive: false,
        }
    }

    /// Whole-string, case-sensitive, recursive.
    pub const fn fixed_recursive() -> Self {
        Self {
            exact: true,
            case_sensitive: true,
            recursive: true,
        }
    }

    /// Sets exact matching.
    pub const fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    /// Sets case sensitivity.
    pub const fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Sets recursion.
    pub const fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// The positional query surface of a tree model.
///
/// Views and other consumers address items with `(row, column, parent)`
/// triples and never hold the items themselves.
///
/// # Implementation Requirements
///
/// At minimum, implement:
/// - [`row_count`](ItemModel::row_count) - Number of rows under a parent
/// - [`column_count`](ItemModel::column_count) - Number of columns
/// - [`data`](ItemModel::data) - Data for a given index and role
/// - [`index`](ItemModel::index) - Create an index for a position
/// - [`parent`](ItemModel::parent) - Get the parent of an index
/// - [`signals`](ItemModel::signals) - Change notifications
pub trait ItemModel: Send + Sync {
    /// Returns the number of rows under the given parent.
    fn row_count(&self, parent: &ModelIndex) -> usize;

    /// Returns the number of columns for children of the given parent.
    fn column_count(&self, parent: &ModelIndex) -> usize;

    /// Returns the data stored under the given role for the item at index.
    ///
    /// Returns `ItemData::None` if the index does not resolve or the role is
    /// not supported.
    fn data(&self, index: &ModelIndex, role: ItemRole) -> ItemData;

    /// Creates a model index for the given row and column under parent.
    ///
    /// Returns `ModelIndex::invalid()` if the position is out of bounds.
    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex;

    /// Returns the parent of the given index.
    ///
    /// Returns `ModelIndex::invalid()` for root-level items and for indices
    /// that do not resolve.
    fn parent(&self, index: &ModelIndex) -> ModelIndex;

    /// Returns the signals for this model.
    fn signals(&self) -> &ModelSignals;

    // -------------------------------------------------------------------------
    // Optional methods with default implementations
    // -------------------------------------------------------------------------

    /// Returns the flags for the item at the given index.
    fn flags(&self, _index: &ModelIndex) -> ItemFlags {
        ItemFlags::new()
    }

    /// Returns `true` if the item at parent has any children.
    fn has_children(&self, parent: &ModelIndex) -> bool {
        self.row_count(parent) > 0
    }

    /// Returns `true` if more children can be fetched for the given parent.
    fn can_fetch_more(&self, _parent: &ModelIndex) -> bool {
        false
    }

    /// Starts fetching children for the given parent.
    fn fetch_more(&self, _parent: &ModelIndex) {}

    // -------------------------------------------------------------------------
    // Convenience methods
    // -------------------------------------------------------------------------

    /// Returns the display text for an item.
    fn display_text(&self, index: &ModelIndex) -> Option<String> {
        self.data(index, ItemRole::Display).into_string()
    }

    /// Creates a sibling index at the given row and column.
    fn sibling(&self, index: &ModelIndex, row: usize, column: usize) -> ModelIndex {
        if !index.is_valid() {
            return ModelIndex::invalid();
        }
        self.index(row, column, &self.parent(index))
    }

    /// Finds items whose `role` data matches `value`.
    ///
    /// The search starts at `start` and walks its following siblings (and,
    /// with `flags.recursive`, all of their descendants). `hits` caps the
    /// number of results; `None` returns every match. An invalid `start`
    /// yields no matches.
    fn match_items(
        &self,
        start: &ModelIndex,
        role: ItemRole,
        value: &ItemData,
        hits: Option<usize>,
        flags: MatchFlags,
    ) -> Vec<ModelIndex> {
        let mut result = Vec::new();
        if !start.is_valid() || hits == Some(0) {
            return result;
        }
        let Some(needle) = value.to_text() else {
            return result;
        };
        let needle = if flags.case_sensitive {
            needle
        } else {
            needle.to_lowercase()
        };

        let search = MatchSearch {
            role,
            needle: &needle,
            hits,
            flags,
        };
        collect_matches(self, &self.parent(start), start.row(), start.column(), &search, &mut result);
        result
    }
}

struct MatchSearch<'a> {
    role: ItemRole,
    needle: &'a str,
    hits: Option<usize>,
    flags: MatchFlags,
}

impl MatchSearch<'_> {
    fn is_match(&self, data: &ItemData) -> bool {
        let Some(text) = data.to_text() else {
            return false;
        };
        let text = if self.flags.case_sensitive {
            text
        } else {
            text.to_lowercase()
        };
        if self.flags.exact {
            text == self.needle
        } else {
            text.contains(self.needle)
        }
    }

    fn is_full(&self, found: usize) -> bool {
        self.hits.is_some_and(|hits| found >= hits)
    }
}

fn collect_matches<M: ItemModel + ?Sized>(
    model: &M,
    parent: &ModelIndex,
    first_row: usize,
    column: usize,
    search: &MatchSearch<'_>,
    result: &mut Vec<ModelIndex>,
) {
    let rows = model.row_count(parent);
    for row in first_row..rows {
        if search.is_full(result.len()) {
            return;
        }

        let index = model.index(row, column, parent);
        if !index.is_valid() {
            continue;
        }

        if search.is_match(&model.data(&index, search.role)) {
            result.push(index);
        }

        if search.flags.recursive && model.has_children(&index) {
            collect_matches(model, &index, 0, column, search, result);
        }
    }
}

/// Collection of signals emitted by item models.
///
/// # Signal Usage
///
/// - **Before modifications**: Emit `rows_about_to_be_*`
/// - **After modifications**: Emit `rows_*`
/// - **Data changes**: Emit `data_changed` for attribute modifications
///
/// The about-to/done pair for one change is always emitted back to back with
/// only that change between them.
pub struct ModelSignals {
    /// Emitted just before rows are inserted.
    /// Args: (parent index, first row, last row)
    pub rows_about_to_be_inserted: Signal<(ModelIndex, usize, usize)>,

    /// Emitted after rows have been inserted.
    /// Args: (parent index, first row, last row)
    pub rows_inserted: Signal<(ModelIndex, usize, usize)>,

    /// Emitted just before rows are removed.
    /// Args: (parent index, first row, last row)
    pub rows_about_to_be_removed: Signal<(ModelIndex, usize, usize)>,

    /// Emitted after rows have been removed.
    /// Args: (parent index, first row, last row)
    pub rows_removed: Signal<(ModelIndex, usize, usize)>,

    /// Emitted when data in existing items changes.
    /// Args: (top-left index, bottom-right index, changed roles)
    pub data_changed: Signal<(ModelIndex, ModelIndex, Vec<ItemRole>)>,

    /// Emitted before the model is reset.
    pub model_about_to_be_reset: Signal<()>,

    /// Emitted after the model has been reset; all indices are invalidated.
    pub model_reset: Signal<()>,
}

impl Default for ModelSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSignals {
    /// Creates a new set of model signals.
    pub fn new() -> Self {
        Self {
            rows_about_to_be_inserted: Signal::new(),
            rows_inserted: Signal::new(),
            rows_about_to_be_removed: Signal::new(),
            rows_removed: Signal::new(),
            data_changed: Signal::new(),
            model_about_to_be_reset: Signal::new(),
            model_reset: Signal::new(),
        }
    }

    /// Emits signals for row insertion.
    ///
    /// Calls the provided function between the about_to_be_inserted and inserted signals.
    pub fn emit_rows_inserted<F>(&self, parent: ModelIndex, first: usize, last: usize, insert_fn: F)
    where
        F: FnOnce(),
    {
        self.rows_about_to_be_inserted.emit((parent, first, last));
        insert_fn();
        self.rows_inserted.emit((parent, first, last));
    }

    /// Emits signals for row removal.
    ///
    /// Calls the provided function between the about_to_be_removed and removed signals.
    pub fn emit_rows_removed<F>(&self, parent: ModelIndex, first: usize, last: usize, remove_fn: F)
    where
        F: FnOnce(),
    {
        self.rows_about_to_be_removed.emit((parent, first, last));
        remove_fn();
        self.rows_removed.emit((parent, first, last));
    }

    /// Emits the data_changed signal for a single item.
    pub fn emit_data_changed_single(&self, index: ModelIndex, roles: Vec<ItemRole>) {
        self.data_changed.emit((index, index, roles));
    }

    /// Emits signals for a model reset.
    ///
    /// Calls the provided function between the about_to_be_reset and reset signals.
    pub fn emit_reset<F>(&self, reset_fn: F)
    where
        F: FnOnce(),
    {
        self.model_about_to_be_reset.emit(());
        reset_fn();
        self.model_reset.emit(());
    }
}
