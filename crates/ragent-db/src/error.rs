//! Error types for ragent-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ragent-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Failures of the dense index and its on-disk form.
#[derive(Debug, Error)]
pub enum DbError {
    /// Reading or writing an index file failed.
    #[error("Dense index I/O error at {path}: {message}")]
    VectorIo { path: PathBuf, message: String },

    /// An index file exists but could not be decoded or encoded.
    #[error("Dense index at {path} is unreadable: {message}")]
    VectorParse { path: PathBuf, message: String },

    /// A vector (record or query) has the wrong number of components.
    #[error("Vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// No `meta.json` in the index directory.
    #[error("No dense index at {path}")]
    IndexNotFound { path: PathBuf },

    /// Payload and metadata disagree (count, dimension or version).
    #[error("Dense index at {path} does not match its metadata: {reason}")]
    IndexIncompatible { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    pub fn vector_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorIo {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn vector_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorParse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn index_incompatible(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexIncompatible {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the index is absent rather than broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IndexNotFound { .. })
    }
}
