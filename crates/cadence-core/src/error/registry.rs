//! Capability registry errors.

use thiserror::Error;

/// Errors returned by the capability registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A component with this id is already registered. Use `replace` to swap it.
    #[error("Component already registered: {0}")]
    DuplicateComponent(String),

    /// No component with this id exists.
    #[error("Component not found: {0}")]
    ComponentNotFound(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
