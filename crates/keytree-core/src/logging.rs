//! Logging facilities for keytree.
//!
//! keytree uses the `tracing` crate for instrumentation. To see logs, install
//! a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("keytree=debug,keytree_core=trace")
//!     .init();
//! ```
//!
//! Every event is emitted under one of the fixed [`targets`], so a filter can
//! select a single subsystem (for example only the lazy-load protocol).

/// Target names for log filtering.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "keytree_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "keytree_core::signal";
    /// Control-thread dispatch target.
    pub const DISPATCH: &str = "keytree_core::dispatch";
    /// Connections model target.
    pub const MODEL: &str = "keytree::model";
    /// Lazy child loading target.
    pub const LAZY_LOAD: &str = "keytree::lazy_load";
    /// Expansion tracking target.
    pub const EXPANSION: &str = "keytree::expansion";
    /// Settings target.
    pub const SETTINGS: &str = "keytree::settings";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Useful for timing a reload or a restoration pass.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "keytree::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Trace-level event under the core target.
#[macro_export]
macro_rules! keytree_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "keytree_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! keytree_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "keytree_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! keytree_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "keytree_core", $($arg)*)
    };
}
