//! Single-wakeup wait/signal object.
//!
//! [`AutoResetEvent`] is the kernel-object half of [`Lock`](crate::Lock): a binary
//! flag that one thread sets and exactly one blocked thread consumes. The blocking
//! itself is delegated to the platform futex through the `atomic-wait` crate.

use std::sync::atomic::{
    AtomicU32,
    Ordering::{Acquire, Relaxed, Release},
};

use atomic_wait::{wait, wake_one};

const UNSET: u32 = 0;
const SET: u32 = 1;

/// A binary event with auto-reset semantics.
///
/// `set` wakes at most one waiter and the waiter that observes the signal resets it
/// in the same atomic step, so every `set` is consumed by exactly one `wait`.
/// Setting an event that is already set does not stack a second wakeup.
///
/// # Examples
///
/// ```rust
/// use lazy_singleton_registry::AutoResetEvent;
/// use std::sync::Arc;
/// use std::thread;
///
/// let event = Arc::new(AutoResetEvent::new(false));
/// let waiter = {
///     let event = event.clone();
///     thread::spawn(move || event.wait())
/// };
///
/// event.set();
/// waiter.join().unwrap();
/// assert!(!event.is_set());
/// ```
#[derive(Debug)]
pub struct AutoResetEvent {
    state: AtomicU32,
}

impl AutoResetEvent {
    /// Creates the event, optionally already signalled.
    pub const fn new(initially_set: bool) -> Self {
        Self {
            state: AtomicU32::new(if initially_set { SET } else { UNSET }),
        }
    }

    /// Blocks until the event is set, then resets it.
    ///
    /// Acquire ordering on the reset pairs with the release in [`set`](Self::set),
    /// so whatever the signalling thread wrote before `set` is visible on return.
    pub fn wait(&self) {
        while self.state.swap(UNSET, Acquire) != SET {
            // Only sleeps while the state is still UNSET; may return spuriously.
            wait(&self.state, UNSET);
        }
    }

    /// Signals the event and wakes one blocked waiter, if any.
    pub fn set(&self) {
        self.state.store(SET, Release);
        wake_one(&self.state);
    }

    /// Returns whether a signal is pending. Diagnostic only, the answer may be
    /// stale by the time it is read.
    pub fn is_set(&self) -> bool {
        self.state.load(Relaxed) == SET
    }
}

impl Default for AutoResetEvent {
    fn default() -> Self {
        Self::new(false)
    }
}
