//! Thread affinity checks.
//!
//! keytree models are single-writer: the thread that creates a model owns it,
//! and every structural mutation must happen there. [`ThreadAffinity`] records
//! that owner and verifies it at runtime.
//!
//! ```
//! use keytree_core::thread_check::ThreadAffinity;
//!
//! struct Owned {
//!     affinity: ThreadAffinity,
//! }
//!
//! impl Owned {
//!     fn mutate(&self) {
//!         self.affinity.debug_assert_same_thread();
//!         // ... safe to mutate ...
//!     }
//! }
//!
//! let owned = Owned { affinity: ThreadAffinity::current() };
//! owned.mutate();
//! ```

use std::thread::ThreadId;

use crate::error::{KeytreeError, Result};

/// The thread an object is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Bind to the current thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// Get the thread ID this affinity is bound to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Check if the current thread matches this affinity.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Return [`KeytreeError::WrongThread`] unless called on the bound thread.
    pub fn check(&self) -> Result<()> {
        let actual = std::thread::current().id();
        if actual == self.thread_id {
            Ok(())
        } else {
            Err(KeytreeError::WrongThread {
                expected: self.thread_id,
                actual,
            })
        }
    }

    /// Assert that we are on the bound thread.
    ///
    /// # Panics
    ///
    /// Panics with a descriptive message if called from a different thread.
    #[inline]
    pub fn assert_same_thread(&self) {
        if !self.is_same_thread() {
            self.panic_wrong_thread();
        }
    }

    /// Debug-only assertion that we are on the bound thread.
    ///
    /// This is a no-op in release builds.
    #[inline]
    pub fn debug_assert_same_thread(&self) {
        #[cfg(debug_assertions)]
        self.assert_same_thread();
    }

    #[cold]
    #[inline(never)]
    fn panic_wrong_thread(&self) -> ! {
        let current = std::thread::current();
        let current_name = current.name().unwrap_or("<unnamed>");

        panic!(
            "thread affinity violation: object bound to {:?} accessed from \"{current_name}\" ({:?}); \
             post the operation to the control thread instead",
            self.thread_id,
            current.id(),
        )
    }
}
