//! Error types for the indexing and retrieval engine

use thiserror::Error;

use crate::types::DocumentStatus;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document could not be loaded or parsed
    #[error("Failed to load '{filename}': {message}")]
    Load { filename: String, message: String },

    /// Document yielded no extractable text
    #[error("Document '{0}' contains no extractable text")]
    EmptyDocument(String),

    /// Embedding provider unavailable, timed out, or returned bad data
    #[error("Embedding provider error: {0}")]
    Provider(String),

    /// Unknown document id
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Registry state-machine violation (caller bug)
    #[error("Invalid transition for document {document_id}: cannot {action} from status {from}")]
    InvalidTransition {
        document_id: String,
        from: DocumentStatus,
        action: &'static str,
    },

    /// Registry/index invariant violation detected at runtime
    #[error("Index consistency violation: {0}")]
    IndexConsistency(String),

    /// Persistent storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a load error
    pub fn load(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
