//! Working memory errors.

use thiserror::Error;

/// Errors returned by session working memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The value could not be serialized to measure or store it.
    #[error("Failed to serialize value for key '{key}': {reason}")]
    Serialization {
        /// Key being written
        key: String,
        /// Serializer message
        reason: String,
    },

    /// A single value exceeds the total working memory capacity.
    #[error("Value for key '{key}' is {size} bytes, exceeding the {capacity} byte working memory limit")]
    ValueTooLarge {
        /// Key being written
        key: String,
        /// Serialized size in bytes
        size: usize,
        /// Configured capacity in bytes
        capacity: usize,
    },
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
