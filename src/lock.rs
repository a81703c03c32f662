//! Mutual exclusion built from an atomic waiter counter and an [`AutoResetEvent`].
//!
//! The counter tracks every thread between `enter` and the matching `exit`, including
//! the ones still blocked. The first thread to raise it from zero owns the lock without
//! touching the event; everybody else parks on the event and is handed the lock by a
//! releasing holder, one at a time.
//!
//! The lock guards no data of its own. Callers pair it with whatever state it protects,
//! which is how [`Registry`](crate::Registry) uses it.

use std::fmt;
use std::sync::atomic::{
    AtomicU32,
    Ordering::{Acquire, Relaxed, Release},
};

use crate::AutoResetEvent;

/// Minimal blocking lock.
///
/// * at most one holder between a returning [`enter`](Lock::enter) and its
///   [`exit`](Lock::exit),
/// * no ordering among waiters, any blocked thread may be the one woken,
/// * not reentrant: calling `enter` twice on one thread without an `exit` in between
///   deadlocks,
/// * an `exit` without a matching `enter` corrupts the counter. This is a precondition
///   violation and is not reported.
///
/// Prefer [`lock`](Lock::lock), which returns a guard that exits on drop.
///
/// # Examples
///
/// ```rust
/// use lazy_singleton_registry::Lock;
///
/// let lock = Lock::new();
/// {
///     let _guard = lock.lock();
///     assert_eq!(lock.waiters(), 1);
/// }
/// assert_eq!(lock.waiters(), 0);
/// ```
pub struct Lock {
    waiters: AtomicU32,
    handoff: AutoResetEvent,
}

impl Lock {
    pub const fn new() -> Self {
        Self {
            waiters: AtomicU32::new(0),
            handoff: AutoResetEvent::new(false),
        }
    }

    /// Acquires the lock, blocking until it is handed over if somebody holds it.
    pub fn enter(&self) {
        if self.waiters.fetch_add(1, Acquire) == 0 {
            return;
        }
        self.handoff.wait();
    }

    /// Releases the lock, waking exactly one blocked thread if there is one.
    pub fn exit(&self) {
        if self.waiters.fetch_sub(1, Release) == 1 {
            return;
        }
        self.handoff.set();
    }

    /// Acquires the lock and returns a guard releasing it on drop.
    pub fn lock(&self) -> LockGuard<'_> {
        self.enter();
        LockGuard { lock: self }
    }

    /// Number of threads holding or waiting for the lock.
    pub fn waiters(&self) -> u32 {
        self.waiters.load(Relaxed)
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("waiters", &self.waiters())
            .finish()
    }
}

/// Holds a [`Lock`] until dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a Lock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.exit();
    }
}
