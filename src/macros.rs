//! Macros for declaring payload singletons.

/// Declares a payload singleton with a single macro invocation.
///
/// The macro generates:
/// - a unit-like struct that can only be built by its own construction path,
/// - an empty [`Payload`](crate::Payload) impl (all behaviour is the shared default),
/// - a [`Singleton`](crate::Singleton) impl whose construction registers the new
///   instance and bumps a per-type counter, readable through `construction_count()`.
///
/// Append `host_guarded` to guard construction with a per-type `static Once` instead of
/// the registry's own per-identity guard.
///
/// # Examples
///
/// ```rust
/// use lazy_singleton_registry::{define_singleton, Payload, Registry};
///
/// define_singleton!(pub Exponent);
/// define_singleton!(pub Logarithm, host_guarded);
///
/// let registry = Registry::new();
/// let exp = registry.instance_of::<Exponent>().unwrap();
/// assert_eq!(exp.run_with_default(|x: f64| x.exp()), 1.0);
/// assert_eq!(exp.name(), "Exponent");
///
/// registry.instance_of::<Logarithm>().unwrap();
/// registry.instance_of::<Logarithm>().unwrap();
/// assert_eq!(Exponent::construction_count(), 1);
/// assert_eq!(Logarithm::construction_count(), 1);
/// ```
#[macro_export]
macro_rules! define_singleton {
    (@declare $(#[$meta:meta])* $vis:vis $name:ident, $guard:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        $vis struct $name {
            _private: (),
        }

        impl $name {
            fn constructions() -> &'static ::std::sync::atomic::AtomicUsize {
                static CONSTRUCTIONS: ::std::sync::atomic::AtomicUsize =
                    ::std::sync::atomic::AtomicUsize::new(0);
                &CONSTRUCTIONS
            }

            /// How many times construction has run for this type, across all registries.
            #[allow(dead_code)]
            $vis fn construction_count() -> usize {
                Self::constructions().load(::std::sync::atomic::Ordering::SeqCst)
            }
        }

        impl $crate::Payload for $name {}

        impl $crate::Singleton for $name {
            fn construct(registry: &$crate::Registry) {
                Self::constructions().fetch_add(1, ::std::sync::atomic::Ordering::SeqCst);
                let instance = ::std::sync::Arc::new($name { _private: () });
                registry.register_arc(instance.clone());
                $crate::Payload::announce(&*instance);
            }

            fn host_guard() -> ::std::option::Option<&'static ::std::sync::Once> {
                $guard
            }
        }
    };
    ($(#[$meta:meta])* $vis:vis $name:ident) => {
        $crate::define_singleton!(@declare $(#[$meta])* $vis $name, None);
    };
    ($(#[$meta:meta])* $vis:vis $name:ident, host_guarded) => {
        $crate::define_singleton!(@declare $(#[$meta])* $vis $name, {
            static GUARD: ::std::sync::Once = ::std::sync::Once::new();
            Some(&GUARD)
        });
    };
}
