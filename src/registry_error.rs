use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Nothing is registered under the requested type.
    #[error("Type not found in registry: {type_name}")]
    TypeNotFound { type_name: &'static str },

    /// The stored instance is not of the requested type.
    #[error("Type mismatch in registry: {type_name}")]
    TypeMismatch { type_name: &'static str },

    /// Construction for the singleton completed without registering an instance,
    /// so the lookup can never resolve.
    #[error("Singleton {type_name} was constructed but never registered")]
    UnknownIdentity { type_name: &'static str },
}
