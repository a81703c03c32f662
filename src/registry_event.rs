use std::fmt;

/// Which half of the double-checked lookup produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPath {
    /// Unlocked read of the published slots.
    Fast,
    /// Re-read while holding the registry lock, after the fast path missed.
    Slow,
}

impl fmt::Display for LookupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupPath::Fast => f.write_str("fast"),
            LookupPath::Slow => f.write_str("slow"),
        }
    }
}

/// Events emitted by the registry during operations.
///
/// These events are passed to the callback installed with
/// [`Registry::with_trace_callback`](crate::Registry::with_trace_callback).
/// The `Clone` derive allows callbacks to store or forward events if needed.
///
/// # Examples
///
/// ```rust
/// use lazy_singleton_registry::RegistryEvent;
///
/// let event = RegistryEvent::Construct { type_name: "Config" };
/// assert_eq!(event.to_string(), "construct { type_name: Config }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A value was offered for registration.
    Register {
        /// The type name of the offered value
        type_name: &'static str,
        /// `false` when the value was empty or the identity was already present
        accepted: bool,
    },

    /// The one-time construction of a singleton is about to run.
    Construct { type_name: &'static str },

    /// A value was looked up, either through `get` or `instance_of`.
    Lookup {
        type_name: &'static str,
        found: bool,
        path: LookupPath,
    },

    /// A presence check was performed.
    Contains { type_name: &'static str, found: bool },
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryEvent::Register {
                type_name,
                accepted,
            } => {
                write!(f, "register {{ type_name: {type_name}, accepted: {accepted} }}")
            }
            RegistryEvent::Construct { type_name } => {
                write!(f, "construct {{ type_name: {type_name} }}")
            }
            RegistryEvent::Lookup {
                type_name,
                found,
                path,
            } => {
                write!(
                    f,
                    "lookup {{ type_name: {type_name}, found: {found}, path: {path} }}"
                )
            }
            RegistryEvent::Contains { type_name, found } => {
                write!(f, "contains {{ type_name: {type_name}, found: {found} }}")
            }
        }
    }
}
