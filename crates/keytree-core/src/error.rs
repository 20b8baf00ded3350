//! Error types for keytree.

use std::fmt;
use std::thread::ThreadId;

/// The main error type for keytree core operations.
#[derive(Debug)]
pub enum KeytreeError {
    /// Signal-related error.
    Signal(SignalError),
    /// A thread-bound operation ran on a thread other than its owner.
    WrongThread {
        /// The thread the object is bound to.
        expected: ThreadId,
        /// The thread the operation was attempted from.
        actual: ThreadId,
    },
}

impl fmt::Display for KeytreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(err) => write!(f, "Signal error: {err}"),
            Self::WrongThread { expected, actual } => {
                write!(f, "Accessed from thread {actual:?}, but bound to {expected:?}")
            }
        }
    }
}

impl std::error::Error for KeytreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Signal(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SignalError> for KeytreeError {
    fn from(err: SignalError) -> Self {
        Self::Signal(err)
    }
}

/// Signal and dispatch errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// No dispatcher is registered for the target thread.
    NoDispatcher,
    /// The target dispatcher has been shut down.
    QueueFailed,
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDispatcher => write!(f, "No dispatcher registered for the target thread"),
            Self::QueueFailed => write!(f, "Failed to queue invocation"),
        }
    }
}

impl std::error::Error for SignalError {}

/// A specialized Result type for keytree core operations.
pub type Result<T> = std::result::Result<T, KeytreeError>;
