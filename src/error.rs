//! Error types for state cells.

use thiserror::Error;

/// Boxed error produced by user-supplied update functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for state cell operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("State shape mismatch: {0}")]
    Shape(String),

    #[error("Expected a record, got {0}")]
    NotARecord(String),

    #[error("Update function failed: {0}")]
    Update(#[source] BoxError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No storage configured for state {0}")]
    NoStorage(String),

    #[error("Inspector error: {0}")]
    Inspector(String),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Storage is locked by another process")]
    Locked,

    #[error("State cell has been dropped")]
    CellDropped,
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Serialization(e.to_string())
    }
}

/// Result type for state cell operations.
pub type Result<T> = std::result::Result<T, StateError>;
