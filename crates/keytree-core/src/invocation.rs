//! Deferred invocations handed to a control thread.
//!
//! A [`QueuedInvocation`] wraps a closure captured on one thread so it can be
//! executed later on another. The [`dispatcher`](crate::dispatcher) module
//! owns the queues these travel through.

/// A type-erased invocation that can be executed later.
pub struct QueuedInvocation {
    invoke: Box<dyn FnOnce() + Send>,
}

impl QueuedInvocation {
    /// Create a new queued invocation.
    pub fn new<F>(invoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            invoke: Box::new(invoke),
        }
    }

    /// Execute the invocation, consuming it.
    pub fn execute(self) {
        crate::keytree_trace!("running queued invocation");
        (self.invoke)();
    }
}

impl std::fmt::Debug for QueuedInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("QueuedInvocation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_execute() {
        let executed = Arc::new(AtomicBool::new(false));

        let executed_clone = executed.clone();
        let invocation = QueuedInvocation::new(move || {
            executed_clone.store(true, Ordering::SeqCst);
        });

        assert!(!executed.load(Ordering::SeqCst));
        invocation.execute();
        assert!(executed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_execute_on_other_thread() {
        let executed = Arc::new(AtomicBool::new(false));

        let executed_clone = executed.clone();
        let invocation = QueuedInvocation::new(move || {
            executed_clone.store(true, Ordering::SeqCst);
        });

        std::thread::spawn(move || invocation.execute())
            .join()
            .unwrap();
        assert!(executed.load(Ordering::SeqCst));
    }
}
