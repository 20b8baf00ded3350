//! Control-thread dispatch.
//!
//! A control thread is the single thread allowed to mutate a model. Work that
//! completes elsewhere (for example a loader thread finishing a fetch) is not
//! applied directly; it is wrapped in a [`QueuedInvocation`] and posted to the
//! control thread's queue, which the owner drains with
//! [`Dispatcher::process_pending`].
//!
//! A thread stays registered while any of its [`Dispatcher`] handles is
//! alive. Dropping the last handle, or calling [`Dispatcher::shutdown`],
//! unregisters it and discards whatever was still queued.
//!
//! # Example
//!
//! ```
//! use keytree_core::dispatcher::{self, Dispatcher};
//! use keytree_core::invocation::QueuedInvocation;
//!
//! let dispatcher = Dispatcher::for_current_thread();
//! let control = dispatcher.thread_id();
//!
//! std::thread::spawn(move || {
//!     dispatcher::post_to(control, QueuedInvocation::new(|| println!("on control thread")))
//!         .unwrap();
//! })
//! .join()
//! .unwrap();
//!
//! assert_eq!(dispatcher.process_pending().unwrap(), 1);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::thread::ThreadId;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;

use crate::error::{Result, SignalError};
use crate::invocation::QueuedInvocation;
use crate::logging::targets;
use crate::thread_check::ThreadAffinity;

struct Queue {
    sender: Sender<QueuedInvocation>,
    receiver: Receiver<QueuedInvocation>,
    registration: Weak<Registration>,
}

/// Shared by every handle of one registration; unregisters on last drop.
struct Registration {
    thread: ThreadId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let removed = {
            let mut queues = queues().lock();
            // The thread may have registered again since the last handle went away.
            match queues.get(&self.thread) {
                Some(queue) if queue.registration.strong_count() == 0 => queues.remove(&self.thread),
                _ => None,
            }
        };

        if let Some(queue) = removed {
            let discarded = queue.receiver.try_iter().count();
            crate::keytree_debug!(thread = ?self.thread, discarded, "control thread unregistered");
        }
    }
}

/// Registered control-thread queues, keyed by owning thread.
static QUEUES: OnceLock<Mutex<HashMap<ThreadId, Queue>>> = OnceLock::new();

fn queues() -> &'static Mutex<HashMap<ThreadId, Queue>> {
    QUEUES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Post an invocation to the control thread identified by `thread`.
///
/// Fails with [`SignalError::NoDispatcher`] if that thread never registered a
/// [`Dispatcher`] or has shut it down.
pub fn post_to(thread: ThreadId, invocation: QueuedInvocation) -> std::result::Result<(), SignalError> {
    let sender = queues()
        .lock()
        .get(&thread)
        .map(|queue| queue.sender.clone())
        .ok_or(SignalError::NoDispatcher)?;

    sender
        .send(invocation)
        .map_err(|_| SignalError::QueueFailed)
}

/// Returns `true` if `thread` has a registered dispatcher.
pub fn has_dispatcher(thread: ThreadId) -> bool {
    queues().lock().contains_key(&thread)
}

/// Handle to the invocation queue of a control thread.
///
/// Handles are cheap to clone and may be moved, but only the owning thread can
/// drain them.
#[derive(Clone)]
pub struct Dispatcher {
    affinity: ThreadAffinity,
    receiver: Receiver<QueuedInvocation>,
    registration: Arc<Registration>,
}

impl Dispatcher {
    /// Register the calling thread as a control thread and return its handle.
    ///
    /// Calling this again on the same thread while a handle is alive returns
    /// a handle to the same queue.
    pub fn for_current_thread() -> Self {
        let affinity = ThreadAffinity::current();
        let thread = affinity.thread_id();
        let mut queues = queues().lock();

        if let Some(queue) = queues.get(&thread) {
            if let Some(registration) = queue.registration.upgrade() {
                return Self {
                    affinity,
                    receiver: queue.receiver.clone(),
                    registration,
                };
            }
        }

        crate::keytree_debug!(thread = ?thread, "registered control thread");
        let registration = Arc::new(Registration { thread });
        let (sender, receiver) = unbounded();
        queues.insert(
            thread,
            Queue {
                sender,
                receiver: receiver.clone(),
                registration: Arc::downgrade(&registration),
            },
        );

        Self {
            affinity,
            receiver,
            registration,
        }
    }

    /// The control thread this dispatcher drains into.
    pub fn thread_id(&self) -> ThreadId {
        self.affinity.thread_id()
    }

    /// Number of invocations waiting to run.
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Run every invocation queued so far.
    ///
    /// Invocations queued while the batch runs wait for the next call. Returns
    /// the number executed, or an error when called off the control thread.
    pub fn process_pending(&self) -> Result<usize> {
        self.affinity.check()?;

        let batch = self.receiver.len();
        let mut executed = 0;
        for _ in 0..batch {
            match self.receiver.try_recv() {
                Ok(invocation) => {
                    invocation.execute();
                    executed += 1;
                }
                Err(_) => break,
            }
        }

        if executed > 0 {
            tracing::trace!(target: targets::DISPATCH, executed, "processed queued invocations");
        }
        Ok(executed)
    }

    /// Wait up to `timeout` for an invocation, then drain the queue.
    ///
    /// Returns 0 if nothing arrived in time.
    pub fn process_pending_timeout(&self, timeout: Duration) -> Result<usize> {
        self.affinity.check()?;

        match self.receiver.recv_timeout(timeout) {
            Ok(invocation) => {
                invocation.execute();
                Ok(1 + self.process_pending()?)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(0),
        }
    }

    /// Unregister the control thread, even if other handles are still alive.
    /// Pending invocations are discarded.
    ///
    /// Returns the number of discarded invocations.
    pub fn shutdown(self) -> usize {
        let removed = {
            let mut queues = queues().lock();
            match queues.get(&self.registration.thread) {
                Some(queue) if queue.registration.ptr_eq(&Arc::downgrade(&self.registration)) => {
                    queues.remove(&self.registration.thread)
                }
                _ => None,
            }
        };
        drop(removed);
        let discarded = self.receiver.try_iter().count();
        if discarded > 0 {
            crate::keytree_warn!(discarded, "dispatcher shut down with pending invocations");
        }
        discarded
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("thread", &self.affinity.thread_id())
            .field("pending", &self.pending_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Dispatcher: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeytreeError;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_post_and_process_same_thread() {
        let dispatcher = Dispatcher::for_current_thread();
        let received = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let received = received.clone();
            post_to(
                dispatcher.thread_id(),
                QueuedInvocation::new(move || received.lock().push(n)),
            )
            .unwrap();
        }

        assert!(received.lock().is_empty());
        assert_eq!(dispatcher.pending_count(), 3);
        assert_eq!(dispatcher.process_pending().unwrap(), 3);
        assert_eq!(*received.lock(), vec![0, 1, 2]);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[test]
    fn test_post_from_other_thread() {
        let dispatcher = Dispatcher::for_current_thread();
        let control = dispatcher.thread_id();
        let ran_on = Arc::new(Mutex::new(None));

        let ran_on_clone = ran_on.clone();
        std::thread::spawn(move || {
            post_to(
                control,
                QueuedInvocation::new(move || {
                    *ran_on_clone.lock() = Some(std::thread::current().id());
                }),
            )
            .unwrap();
        })
        .join()
        .unwrap();

        assert!(ran_on.lock().is_none());
        dispatcher.process_pending().unwrap();
        assert_eq!(*ran_on.lock(), Some(control));
    }

    #[test]
    fn test_post_without_dispatcher() {
        let unregistered = std::thread::spawn(|| std::thread::current().id())
            .join()
            .unwrap();
        let result = post_to(unregistered, QueuedInvocation::new(|| {}));
        assert_eq!(result, Err(SignalError::NoDispatcher));
    }

    #[test]
    fn test_process_off_control_thread_fails() {
        let dispatcher = Dispatcher::for_current_thread();
        let result = std::thread::spawn(move || dispatcher.process_pending())
            .join()
            .unwrap();
        assert!(matches!(result, Err(KeytreeError::WrongThread { .. })));
    }

    #[test]
    fn test_reentrant_posts_wait_for_next_batch() {
        let dispatcher = Dispatcher::for_current_thread();
        let control = dispatcher.thread_id();

        post_to(
            control,
            QueuedInvocation::new(move || {
                post_to(control, QueuedInvocation::new(|| {})).unwrap();
            }),
        )
        .unwrap();

        assert_eq!(dispatcher.process_pending().unwrap(), 1);
        assert_eq!(dispatcher.pending_count(), 1);
        assert_eq!(dispatcher.process_pending().unwrap(), 1);
    }

    #[test]
    fn test_timeout_without_work() {
        let dispatcher = Dispatcher::for_current_thread();
        let executed = dispatcher
            .process_pending_timeout(Duration::from_millis(5))
            .unwrap();
        assert_eq!(executed, 0);
    }

    #[test]
    fn test_shutdown_unregisters() {
        let dispatcher = Dispatcher::for_current_thread();
        let control = dispatcher.thread_id();
        post_to(control, QueuedInvocation::new(|| {})).unwrap();

        assert!(has_dispatcher(control));
        assert_eq!(dispatcher.shutdown(), 1);
        assert!(!has_dispatcher(control));
        assert_eq!(
            post_to(control, QueuedInvocation::new(|| {})),
            Err(SignalError::NoDispatcher)
        );
    }

    #[test]
    fn test_dropping_last_handle_unregisters() {
        let (control, ran) = std::thread::spawn(|| {
            let dispatcher = Dispatcher::for_current_thread();
            let control = dispatcher.thread_id();
            let second = Dispatcher::for_current_thread();

            let ran = Arc::new(Mutex::new(false));
            let r = ran.clone();
            post_to(control, QueuedInvocation::new(move || *r.lock() = true)).unwrap();
            assert_eq!(second.pending_count(), 1);

            drop(dispatcher);
            assert!(has_dispatcher(control));
            drop(second);
            assert!(!has_dispatcher(control));
            (control, ran)
        })
        .join()
        .unwrap();

        assert!(!*ran.lock());
        assert_eq!(
            post_to(control, QueuedInvocation::new(|| {})),
            Err(SignalError::NoDispatcher)
        );
    }

    #[test]
    fn test_register_again_after_drop() {
        let first = Dispatcher::for_current_thread();
        let control = first.thread_id();
        drop(first);
        assert!(!has_dispatcher(control));

        let again = Dispatcher::for_current_thread();
        post_to(control, QueuedInvocation::new(|| {})).unwrap();
        assert_eq!(again.process_pending().unwrap(), 1);
    }
}
