//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
///
/// The store never swallows an error to produce a default value: every
/// failure surfaces to the caller, which owns retry policy for the workflow
/// step as a whole.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint matches the query. Recoverable; the caller decides the
    /// fallback.
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    /// A synchronous API variant was invoked on an async-only store.
    /// Programmer error, fatal.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary serialization error
    #[error("Binary serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),

    /// Storage backend error, propagated unmodified; the store performs no
    /// internal retry
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid checkpoint or configuration
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
