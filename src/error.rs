//! Error types for the vector search engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AnnError>;

/// Error types that can occur in engine operations
#[derive(Error, Debug)]
pub enum AnnError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate record id: {id}")]
    DuplicateId { id: String },

    #[error("Record not found: {id}")]
    NotFound { id: String },

    #[error("Cannot build an index over an empty store")]
    EmptyIndex,

    #[error("Index has not been built yet")]
    IndexNotBuilt,

    #[error("Another index build is already running")]
    BuildInProgress,

    #[error("Index build was cancelled")]
    BuildCancelled,

    #[error("Collection is closed")]
    Closed,

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("No embedding available for {input:?}")]
    NoEmbedding { input: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl AnnError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        AnnError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}
