//! Core systems for keytree.
//!
//! This crate provides the foundational pieces the connections model is built
//! on:
//!
//! - **Signal/Slot System**: Type-safe notification between nodes, models and
//!   consumers
//! - **Dispatcher**: Queues that hand work back to a model's control thread
//! - **Thread Affinity**: Runtime checks for the single-writer rule
//! - **Logging**: `tracing` targets and helpers
//!
//! # Signal/Slot Example
//!
//! ```
//! use keytree_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//!
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```

pub mod dispatcher;
mod error;
pub mod invocation;
pub mod logging;
pub mod signal;
pub mod thread_check;

pub use dispatcher::Dispatcher;
pub use error::{KeytreeError, Result, SignalError};
pub use logging::PerfSpan;
pub use signal::{ConnectionId, ConnectionType, Signal};
pub use thread_check::ThreadAffinity;
