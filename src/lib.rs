//! # Lazy Singleton Registry
//!
//! Exactly-once, thread-safe, lazy construction of a fixed set of singletons, retrievable
//! by type under heavy contention, on top of a lock built from first principles.
//!
//! The crate has two layers:
//!
//! - [`Lock`] - a blocking mutual-exclusion primitive made of an atomic waiter counter
//!   and an auto-reset [`AutoResetEvent`] that hands the lock to one waiter at a time.
//! - [`Registry`] - maps each [`Singleton`] type to its unique instance. Lookups read
//!   without locking and only fall back to a locked re-read when that first read misses.
//!
//! ## Quick Start
//!
//! ```rust
//! use lazy_singleton_registry::{define_singleton, Payload, Registry};
//! use std::sync::Arc;
//! use std::thread;
//!
//! define_singleton!(pub Settings);
//!
//! let registry = Registry::new();
//! let handles: Vec<Arc<Settings>> = thread::scope(|s| {
//!     let workers: Vec<_> = (0..4)
//!         .map(|_| s.spawn(|| registry.instance_of::<Settings>().unwrap()))
//!         .collect();
//!     workers.into_iter().map(|w| w.join().unwrap()).collect()
//! });
//!
//! assert!(handles.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
//! assert_eq!(Settings::construction_count(), 1);
//! assert_eq!(handles[0].name(), "Settings");
//! ```
//!
//! ## Main Types
//!
//! - [`Registry::instance_of`] - get a singleton, constructing it exactly once
//! - [`Registry::register`] / [`Registry::register_arc`] - called by construction logic
//! - [`Registry::get`] / [`Registry::contains`] - lookups that never construct
//! - [`Registry::with_trace_callback`] - observe every registry operation
//! - [`harness::run`] - drive a registry from many threads behind a start gate

mod lock;
mod macros;
mod registry;
mod registry_error;
mod registry_event;
mod signal;
mod singleton;

pub mod harness;

// Re-export the main public API
pub use lock::{Lock, LockGuard};
pub use registry::{Registry, TraceCallback};
pub use registry_error::RegistryError;
pub use registry_event::{LookupPath, RegistryEvent};
pub use signal::AutoResetEvent;
pub use singleton::{Payload, Singleton};
