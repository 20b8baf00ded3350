//! Signal/slot system for keytree.
//!
//! Signals are emitted by models and nodes when their state changes, and
//! connected slots (callbacks) are invoked in response.
//!
//! # Connection Types
//!
//! - **Direct**: Slot is called immediately in the emitting thread
//! - **Queued**: Slot execution is posted to the connecting thread's
//!   [`Dispatcher`](crate::dispatcher::Dispatcher)
//! - **Auto**: Direct if emitted on the connecting thread, Queued otherwise
//!   (default)
//!
//! # Re-entrancy
//!
//! Slots run after the connection table has been released, so a slot may
//! connect, disconnect, or emit on the same signal without deadlocking.
//!
//! # Example
//!
//! ```
//! use keytree_core::Signal;
//!
//! let text_changed = Signal::<String>::new();
//!
//! let conn_id = text_changed.connect(|text| {
//!     println!("Text changed to: {}", text);
//! });
//!
//! text_changed.emit("Hello, World!".to_string());
//! text_changed.disconnect(conn_id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::dispatcher;
use crate::invocation::QueuedInvocation;
use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    pub struct ConnectionId;
}

/// Specifies how a connected slot should be invoked when the signal is emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionType {
    /// Invoke the slot immediately in the emitting thread.
    Direct,

    /// Post the slot invocation to the connecting thread's dispatcher.
    ///
    /// The slot runs when that thread drains its queue.
    Queued,

    /// Direct when emitted on the connecting thread, Queued otherwise.
    #[default]
    Auto,
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// Internal storage for a single connection.
struct Connection<Args> {
    slot: Slot<Args>,
    connection_type: ConnectionType,
    /// The thread this connection was created on.
    target_thread: ThreadId,
}

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple like `(String, i32)` for multiple arguments.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Connection<Args>>>,
    blocked: AtomicBool,
}

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal with [`ConnectionType::Auto`].
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connect_with_type(slot, ConnectionType::Auto)
    }

    /// Connect a slot with a specific connection type.
    ///
    /// # Example
    ///
    /// ```
    /// use keytree_core::{ConnectionType, Signal};
    ///
    /// let signal = Signal::<i32>::new();
    /// signal.connect_with_type(|n| println!("{}", n), ConnectionType::Direct);
    /// signal.emit(42);
    /// ```
    pub fn connect_with_type<F>(&self, slot: F, connection_type: ConnectionType) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let connection = Connection {
            slot: Arc::new(slot),
            connection_type,
            target_thread: std::thread::current().id(),
        };
        self.connections.lock().insert(connection)
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots.
    ///
    /// If the signal is blocked, this does nothing. Queued invocations whose
    /// target thread has no dispatcher are dropped with a warning.
    #[tracing::instrument(skip_all, target = "keytree_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let current_thread = std::thread::current().id();
        let snapshot: Vec<(Slot<Args>, ConnectionType, ThreadId)> = self
            .connections
            .lock()
            .values()
            .map(|conn| (conn.slot.clone(), conn.connection_type, conn.target_thread))
            .collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = snapshot.len(), "emitting signal");

        for (slot, connection_type, target_thread) in snapshot {
            let direct = match connection_type {
                ConnectionType::Direct => true,
                ConnectionType::Auto => target_thread == current_thread,
                ConnectionType::Queued => false,
            };

            if direct {
                slot(&args);
            } else {
                Self::queue_invocation(slot, args.clone(), target_thread);
            }
        }
    }

    /// Post an invocation to the target thread's dispatcher.
    fn queue_invocation(slot: Slot<Args>, args: Args, target_thread: ThreadId) {
        let invocation = QueuedInvocation::new(move || {
            slot(&args);
        });

        if let Err(err) = dispatcher::post_to(target_thread, invocation) {
            tracing::warn!(
                target: targets::SIGNAL,
                thread = ?target_thread,
                %err,
                "dropping queued signal"
            );
        }
    }
}

static_assertions::assert_impl_all!(Signal<String>: Send, Sync);
