//! Singleton identities and the behaviour shared by every payload singleton.

use std::any::Any;
use std::sync::Once;
use std::thread;

use crate::Registry;

/// A singleton kind. The implementing type is its identity.
///
/// [`Registry::instance_of`] runs [`construct`](Singleton::construct) at most once per
/// identity and expects it to hand the finished instance to one of the `register*`
/// methods. Construction may itself request *other* singletons; requesting the one
/// being constructed deadlocks.
///
/// # Examples
///
/// ```rust
/// use lazy_singleton_registry::{Registry, Singleton};
/// use std::sync::Arc;
///
/// struct Clock {
///     epoch: u64,
/// }
///
/// impl Singleton for Clock {
///     fn construct(registry: &Registry) {
///         registry.register(Clock { epoch: 1_700_000_000 });
///     }
/// }
///
/// let registry = Registry::new();
/// let clock: Arc<Clock> = registry.instance_of().unwrap();
/// assert_eq!(clock.epoch, 1_700_000_000);
/// ```
pub trait Singleton: Any + Send + Sync {
    /// Builds the instance and registers it.
    fn construct(registry: &Registry);

    /// One-time guard supplied by the host.
    ///
    /// `None` (the default) lets the registry guard construction with its own
    /// per-identity flag and lock. Returning a `static Once` instead makes construction
    /// process-wide: only the first registry to ask will ever receive the instance.
    fn host_guard() -> Option<&'static Once> {
        None
    }
}

/// The capability set every payload singleton exposes.
///
/// All methods have default implementations, so a payload type only needs an empty
/// `impl Payload for T {}`.
pub trait Payload {
    /// Short name of the concrete type, without its module path or generic arguments.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Runs `action` with the default value of its argument type.
    fn run_with_default<T: Default, R>(&self, action: impl FnOnce(T) -> R) -> R
    where
        Self: Sized,
    {
        action(T::default())
    }

    /// Logs the creation of this singleton on the current thread.
    fn announce(&self) {
        let current = thread::current();
        tracing::info!(
            singleton = self.name(),
            thread = current.name().unwrap_or("unnamed"),
            "created"
        );
    }
}
