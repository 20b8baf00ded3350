//! Text dumps of a model's tree for diagnostics.
//!
//! ```
//! use keytree::model::{ConnectionsModel, ItemType, LazyItem, ModelConfig, ModelTreeDebug};
//!
//! let model = ConnectionsModel::new(ModelConfig::default());
//! model.add_root_item(LazyItem::leaf(ItemType::Server, "local", model.item_events()));
//!
//! let dump = ModelTreeDebug::new().format(&*model);
//! assert!(dump.contains("local"));
//! ```

use std::fmt::{self, Write};

use super::index::ModelIndex;
use super::role::ItemRole;
use super::traits::ItemModel;

/// Style of the branch drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
}

/// Configuration for tree dump output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    pub style: TreeStyle,
    /// Append the internal id of every index.
    pub show_ids: bool,
    /// Append the type tag.
    pub show_types: bool,
    /// Mark nodes whose children can still be fetched.
    pub show_fetchable: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: false,
            show_types: true,
            show_fetchable: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Names only.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_types: false,
            show_fetchable: false,
            ..Default::default()
        }
    }

    /// Everything, including ids.
    pub fn detailed() -> Self {
        Self {
            show_ids: true,
            ..Default::default()
        }
    }
}

/// Walks any [`ItemModel`] through its positional interface and renders it.
///
/// Only rows the model currently reports are shown; nothing is fetched.
#[derive(Debug, Clone, Default)]
pub struct ModelTreeDebug {
    options: TreeFormatOptions,
}

impl ModelTreeDebug {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Renders the whole model into a string.
    pub fn format<M: ItemModel + ?Sized>(&self, model: &M) -> String {
        self.display(model).to_string()
    }

    /// Adapter that renders `model` through [`fmt::Display`].
    pub fn display<'a, M: ItemModel + ?Sized>(&'a self, model: &'a M) -> ModelTreeDisplay<'a, M> {
        ModelTreeDisplay { debug: self, model }
    }

    /// Renders the whole model into `out`.
    pub fn write<M, W>(&self, model: &M, out: &mut W) -> fmt::Result
    where
        M: ItemModel + ?Sized,
        W: Write,
    {
        let root = ModelIndex::invalid();
        let rows = model.row_count(&root);
        writeln!(out, "Model ({rows} root items):")?;
        if rows == 0 {
            return writeln!(out, "  (empty)");
        }
        for row in 0..rows {
            let index = model.index(row, 0, &root);
            self.write_subtree(model, &index, 0, row + 1 == rows, out)?;
        }
        Ok(())
    }

    fn write_subtree<M, W>(
        &self,
        model: &M,
        index: &ModelIndex,
        depth: usize,
        is_last: bool,
        out: &mut W,
    ) -> fmt::Result
    where
        M: ItemModel + ?Sized,
        W: Write,
    {
        if !index.is_valid() || self.options.max_depth.is_some_and(|max| depth > max) {
            return Ok(());
        }

        out.write_str(&self.build_prefix(depth, is_last))?;
        let name = model
            .display_text(index)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "(unnamed)".to_string());
        out.write_str(&name)?;

        if self.options.show_ids {
            write!(out, " [#{}]", index.internal_id())?;
        }
        if self.options.show_types {
            if let Some(tag) = model.data(index, ItemRole::Type).as_string() {
                write!(out, " ({tag})")?;
            }
        }
        if self.options.show_fetchable && model.can_fetch_more(index) {
            out.write_str(" ...")?;
        }
        out.write_char('\n')?;

        let rows = model.row_count(index);
        for row in 0..rows {
            let child = model.index(row, 0, index);
            self.write_subtree(model, &child, depth + 1, row + 1 == rows, out)?;
        }
        Ok(())
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.options.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }
}

/// Returned by [`ModelTreeDebug::display`].
pub struct ModelTreeDisplay<'a, M: ?Sized> {
    debug: &'a ModelTreeDebug,
    model: &'a M,
}

impl<M: ItemModel + ?Sized> fmt::Display for ModelTreeDisplay<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug.write(self.model, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionsModel, ItemRef, ItemType, LazyItem, LoadCompletion, ModelConfig};

    fn sample() -> std::sync::Arc<ConnectionsModel> {
        let model = ConnectionsModel::new(ModelConfig::default());
        let events = model.item_events();
        let lazy = LazyItem::builder(ItemType::Database, "db1", events.clone())
            .loader(|_item: ItemRef, completion: LoadCompletion| completion.finish(Vec::new()))
            .build();
        let server = LazyItem::builder(ItemType::Server, "local", events.clone())
            .children(vec![
                LazyItem::leaf(ItemType::Database, "db0", events.clone()) as ItemRef,
                lazy as ItemRef,
            ])
            .build();
        model.add_root_item(server);
        model
    }

    #[test]
    fn test_empty_model() {
        let model = ConnectionsModel::new(ModelConfig::default());
        let dump = ModelTreeDebug::new().format(&*model);
        assert_eq!(dump, "Model (0 root items):\n  (empty)\n");
    }

    #[test]
    fn test_ascii_dump() {
        let model = sample();
        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            ..Default::default()
        };
        let dump = ModelTreeDebug::with_options(options).format(&*model);
        assert_eq!(
            dump,
            "Model (1 root items):\n\
             local (server)\n\
             +-- db0 (database)\n\
             `-- db1 (database) ...\n"
        );
    }

    #[test]
    fn test_minimal_with_depth_limit() {
        let model = sample();
        let options = TreeFormatOptions {
            max_depth: Some(0),
            ..TreeFormatOptions::minimal()
        };
        let dump = ModelTreeDebug::with_options(options).format(&*model);
        assert_eq!(dump, "Model (1 root items):\nlocal\n");
    }

    #[test]
    fn test_display_matches_format() {
        let model = sample();
        let debug = ModelTreeDebug::new();
        assert_eq!(format!("{}", debug.display(&*model)), debug.format(&*model));
    }
}
