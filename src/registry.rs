//! Exactly-once lazy singleton registry.
//!
//! Instances live in an insert-only list of per-identity slots. Slots and instances
//! are only ever *added*, always while holding the registry [`Lock`], and published
//! with release stores. Readers walk the list without locking (the fast path). When
//! that read misses, the reader takes the lock and reads again (the slow path) before
//! concluding the instance is absent.
//!
//! # Examples
//!
//! ```
//! use lazy_singleton_registry::Registry;
//! use std::sync::Arc;
//!
//! let registry = Registry::new();
//! registry.register("Hello, World!".to_string());
//!
//! let message: Arc<String> = registry.get().unwrap();
//! assert_eq!(&*message, "Hello, World!");
//! ```

use std::{
    any::{type_name, Any, TypeId},
    fmt, iter, ptr,
    sync::{
        atomic::{
            AtomicBool, AtomicPtr,
            Ordering::{Acquire, Relaxed, Release},
        },
        Arc,
    },
};

use crate::{Lock, LockGuard, LookupPath, RegistryError, RegistryEvent, Singleton};

type Instance = Arc<dyn Any + Send + Sync>;

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives a reference to a `RegistryEvent` every time the registry is
/// interacted with. It must be thread-safe because the registry is shared between threads.
pub type TraceCallback = dyn Fn(&RegistryEvent) + Send + Sync + 'static;

/// Everything the registry knows about one identity.
struct Slot {
    identity: TypeId,
    type_name: &'static str,
    /// Null while absent. Set once, under the registry lock.
    instance: AtomicPtr<Instance>,
    /// Set once the registry-guarded construction has finished.
    constructed: AtomicBool,
    /// Serialises registry-guarded construction of this identity.
    construction: Lock,
    /// Immutable once the slot is published.
    next: *mut Slot,
}

impl Slot {
    fn new(identity: TypeId, type_name: &'static str, next: *mut Slot) -> Self {
        Self {
            identity,
            type_name,
            instance: AtomicPtr::new(ptr::null_mut()),
            constructed: AtomicBool::new(false),
            construction: Lock::new(),
            next,
        }
    }

    fn instance(&self) -> Option<&Instance> {
        // SAFETY: a non-null pointer comes from `Box::into_raw` in `Registry::publish`,
        // is never replaced and is freed only when the slot itself is dropped.
        unsafe { self.instance.load(Acquire).as_ref() }
    }

    fn is_present(&self) -> bool {
        self.instance().is_some()
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let instance = *self.instance.get_mut();
        if !instance.is_null() {
            // SAFETY: see `Slot::instance`; `&mut self` rules out readers.
            drop(unsafe { Box::from_raw(instance) });
        }
    }
}

/// Registry mapping each singleton identity to its unique instance.
///
/// A registry is meant to be created once at start-up and shared (by reference or
/// `Arc`) with every thread that needs singletons; it is torn down, together with
/// every instance it holds, when dropped. Identities are never removed.
pub struct Registry {
    head: AtomicPtr<Slot>,
    lock: Lock,
    trace: Option<Box<TraceCallback>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            lock: Lock::new(),
            trace: None,
        }
    }

    /// Creates a registry that reports every operation to `callback`.
    ///
    /// The callback must not register values from inside a
    /// [`RegistryEvent::Construct`] notification for the identity being constructed.
    ///
    /// # Example
    /// ```rust
    /// use lazy_singleton_registry::Registry;
    ///
    /// let registry = Registry::with_trace_callback(|event| println!("[registry-trace] {event}"));
    /// registry.register(1u8);
    /// ```
    pub fn with_trace_callback(callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            lock: Lock::new(),
            trace: Some(Box::new(callback)),
        }
    }

    fn emit_event(&self, event: &RegistryEvent) {
        if let Some(callback) = self.trace.as_deref() {
            callback(event);
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Slots
    // ---------------------------------------------------------------------------------------------

    fn slots(&self) -> impl Iterator<Item = &Slot> + '_ {
        // SAFETY: slots are fully initialised before being published with a release store,
        // `next` never changes afterwards and slots are freed only by `Drop`.
        let head = unsafe { self.head.load(Acquire).as_ref() };
        iter::successors(head, |slot| unsafe { slot.next.as_ref() })
    }

    fn find(&self, identity: TypeId) -> Option<&Slot> {
        self.slots().find(|slot| slot.identity == identity)
    }

    /// Returns the slot for `identity`, appending it if missing.
    ///
    /// Taking the guard by reference proves the registry lock is held, which keeps two
    /// writers from appending a slot for the same identity.
    fn slot_locked(&self, _guard: &LockGuard<'_>, identity: TypeId, type_name: &'static str) -> &Slot {
        if let Some(slot) = self.find(identity) {
            return slot;
        }

        let slot = Box::into_raw(Box::new(Slot::new(identity, type_name, self.head.load(Relaxed))));
        self.head.store(slot, Release);
        // SAFETY: just leaked from a `Box`; freed only by `Drop`.
        unsafe { &*slot }
    }

    fn slot(&self, identity: TypeId, type_name: &'static str) -> &Slot {
        match self.find(identity) {
            Some(slot) => slot,
            None => {
                let guard = self.lock.lock();
                self.slot_locked(&guard, identity, type_name)
            }
        }
    }

    /// Stores `instance` unless the identity already has one.
    fn publish(
        &self,
        guard: &LockGuard<'_>,
        identity: TypeId,
        type_name: &'static str,
        instance: Instance,
    ) -> bool {
        let slot = self.slot_locked(guard, identity, type_name);
        if !slot.instance.load(Relaxed).is_null() {
            return false;
        }
        slot.instance
            .store(Box::into_raw(Box::new(instance)), Release);
        true
    }

    // ---------------------------------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------------------------------

    /// Registers a value, wrapping it in an `Arc`.
    ///
    /// Returns `false` if a value of the same type is already registered; the first
    /// one is kept.
    pub fn register<T: Send + Sync + 'static>(&self, value: T) -> bool {
        self.register_arc(Arc::new(value))
    }

    /// Registers an `Arc`-wrapped value.
    ///
    /// More efficient than `register` when you already have an `Arc`, as it avoids
    /// creating an additional reference count.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use lazy_singleton_registry::Registry;
    ///
    /// let registry = Registry::new();
    /// let value = Arc::new("shared".to_string());
    /// assert!(registry.register_arc(value.clone()));
    ///
    /// let retrieved: Arc<String> = registry.get().expect("Failed to get value");
    /// assert!(Arc::ptr_eq(&value, &retrieved));
    /// ```
    pub fn register_arc<T: Send + Sync + 'static>(&self, value: Arc<T>) -> bool {
        let type_name = type_name::<T>();
        let accepted = {
            let guard = self.lock.lock();
            self.publish(&guard, TypeId::of::<T>(), type_name, value)
        };

        if accepted {
            tracing::debug!(type_name, "registered");
        } else {
            tracing::warn!(type_name, "already registered, keeping the first instance");
        }
        self.emit_event(&RegistryEvent::Register {
            type_name,
            accepted,
        });

        accepted
    }

    /// Registers `value` if there is one. An empty value is ignored and reported as
    /// not accepted.
    pub fn register_option<T: Send + Sync + 'static>(&self, value: Option<Arc<T>>) -> bool {
        match value {
            Some(value) => self.register_arc(value),
            None => {
                let type_name = type_name::<T>();
                tracing::debug!(type_name, "ignoring empty registration");
                self.emit_event(&RegistryEvent::Register {
                    type_name,
                    accepted: false,
                });
                false
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------------------------------

    /// Double-checked read: unlocked first, then again under the registry lock.
    ///
    /// A miss on the fast path may only mean the registering thread has not published
    /// yet. Any publication that completed before we acquire the lock is visible to
    /// the locked re-read.
    fn lookup(&self, identity: TypeId) -> (Option<&Instance>, LookupPath) {
        if let Some(instance) = self.find(identity).and_then(Slot::instance) {
            return (Some(instance), LookupPath::Fast);
        }

        let _guard = self.lock.lock();
        tracing::trace!(?identity, "fast path missed, re-reading under lock");
        (self.find(identity).and_then(Slot::instance), LookupPath::Slow)
    }

    fn downcast<T: Send + Sync + 'static>(instance: &Instance) -> Result<Arc<T>, RegistryError> {
        Arc::clone(instance)
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                type_name: type_name::<T>(),
            })
    }

    /// Retrieves a registered value without triggering any construction.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::TypeNotFound`] if nothing of type `T` is registered
    /// - [`RegistryError::TypeMismatch`] if the stored value has a different type
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, RegistryError> {
        let type_name = type_name::<T>();
        let (instance, path) = self.lookup(TypeId::of::<T>());
        let result = match instance {
            Some(instance) => Self::downcast::<T>(instance),
            None => Err(RegistryError::TypeNotFound { type_name }),
        };

        self.emit_event(&RegistryEvent::Lookup {
            type_name,
            found: result.is_ok(),
            path,
        });

        result
    }

    /// Returns the unique instance of `S`, constructing it first if nobody has yet.
    ///
    /// Any number of threads may call this concurrently. Construction runs exactly
    /// once and every caller, including the ones racing it, receives the same `Arc`.
    /// Once the instance is present the call takes no lock.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownIdentity`] if `S::construct` finished without
    /// registering an instance of `S`.
    pub fn instance_of<S: Singleton>(&self) -> Result<Arc<S>, RegistryError> {
        self.ensure_constructed::<S>();

        let type_name = type_name::<S>();
        let (instance, path) = self.lookup(TypeId::of::<S>());
        let result = match instance {
            Some(instance) => Self::downcast::<S>(instance),
            None => {
                tracing::error!(type_name, "construction finished without registering");
                Err(RegistryError::UnknownIdentity { type_name })
            }
        };

        self.emit_event(&RegistryEvent::Lookup {
            type_name,
            found: result.is_ok(),
            path,
        });

        result
    }

    /// Runs the construction of `S` unless it has already run (or a value of type `S`
    /// was registered directly). Returns once construction has completed, on whichever
    /// thread it ran.
    ///
    /// If `S::construct` panics the identity stays absent and the next caller retries.
    pub fn ensure_constructed<S: Singleton>(&self) {
        if let Some(once) = S::host_guard() {
            // `call_once_force` re-runs after a panicking construction poisoned the guard.
            once.call_once_force(|_| {
                if !self.find(TypeId::of::<S>()).is_some_and(Slot::is_present) {
                    self.construct::<S>();
                }
            });
            return;
        }

        let slot = self.slot(TypeId::of::<S>(), type_name::<S>());
        if slot.constructed.load(Acquire) || slot.is_present() {
            return;
        }

        let _guard = slot.construction.lock();
        if !slot.constructed.load(Relaxed) && !slot.is_present() {
            self.construct::<S>();
            slot.constructed.store(true, Release);
        }
    }

    fn construct<S: Singleton>(&self) {
        let type_name = type_name::<S>();
        tracing::debug!(type_name, "constructing singleton");
        self.emit_event(&RegistryEvent::Construct { type_name });
        S::construct(self);
    }

    /// Checks if a value of type `T` is registered.
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        let (instance, _) = self.lookup(TypeId::of::<T>());
        let found = instance.is_some();

        self.emit_event(&RegistryEvent::Contains {
            type_name: type_name::<T>(),
            found,
        });

        found
    }

    /// Number of identities with a registered instance.
    pub fn len(&self) -> usize {
        self.slots().filter(|slot| slot.is_present()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present: Vec<&str> = self
            .slots()
            .filter(|slot| slot.is_present())
            .map(|slot| slot.type_name)
            .collect();

        f.debug_struct("Registry")
            .field("present", &present)
            .field("lock", &self.lock)
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let mut cursor = *self.head.get_mut();
        while !cursor.is_null() {
            // SAFETY: every slot was leaked from a `Box` exactly once and `&mut self`
            // rules out concurrent readers.
            let slot = unsafe { Box::from_raw(cursor) };
            cursor = slot.next;
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
