//! Error types for blobkv
//!
//! Provides a unified error type for all operations.

use std::sync::Arc;

use thiserror::Error;

/// Result type alias using BlobError
pub type Result<T> = std::result::Result<T, BlobError>;

/// Unified error type for blobkv operations
///
/// Cloneable so an iterator can keep reporting the same failure from
/// `status()` after it has been recorded.
#[derive(Debug, Clone, Error)]
pub enum BlobError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Corrupt property: {0}")]
    CorruptProperty(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Blob file {0} not found")]
    BlobFileNotFound(u64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Escalated Errors
    // -------------------------------------------------------------------------
    /// A read failure the caller asked to be surfaced as fatal
    /// (`FailurePolicy::Fatal`). The caller decides how to escalate it.
    #[error("Fatal read failure: {0}")]
    Fatal(Box<BlobError>),
}

impl From<std::io::Error> for BlobError {
    fn from(err: std::io::Error) -> Self {
        BlobError::Io(Arc::new(err))
    }
}

impl BlobError {
    /// Whether this error was escalated through `FailurePolicy::Fatal`
    pub fn is_fatal(&self) -> bool {
        matches!(self, BlobError::Fatal(_))
    }

    /// Whether this error means some persisted data could not be trusted
    pub fn is_corruption(&self) -> bool {
        match self {
            BlobError::Decode(_) | BlobError::CorruptProperty(_) | BlobError::Corruption(_) => {
                true
            }
            BlobError::Fatal(inner) => inner.is_corruption(),
            _ => false,
        }
    }
}
