//! Error types for ragent-core.
//!
//! The pipeline absorbs most collaborator failures (retrieval, expansion,
//! reranking) and degrades instead. The variants below are what remains
//! visible to callers: configuration problems, index I/O, and generation
//! failures on the synchronous answer path.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by ragent-core.
#[derive(Error, Debug)]
pub enum RagError {
    /// The configuration file could not be read or parsed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {message}\n  Hint: {hint}")]
    InvalidConfiguration { message: String, hint: String },

    /// Reading or writing the persisted index failed.
    #[error("Index I/O error at {path}: {message}")]
    IndexIo { path: PathBuf, message: String },

    /// The persisted index exists but could not be decoded.
    #[error("Index parse error at {path}: {message}")]
    IndexParse { path: PathBuf, message: String },

    /// A request is missing something the pipeline needs.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A passage handed to indexing violates the ingestion contract.
    #[error("Invalid passage at position {position}: {reason}")]
    InvalidPassage { position: usize, reason: String },

    /// The embedding collaborator failed.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The pairwise scoring collaborator failed.
    #[error("Reranking failed: {0}")]
    Reranker(String),

    /// The query expansion collaborator failed or produced nothing usable.
    #[error("Query expansion failed: {0}")]
    Expansion(String),

    /// A generation provider failed.
    #[error("Generation failed ({provider}): {message}")]
    Generation { provider: String, message: String },

    /// No generation provider is available to serve the request.
    #[error("No generation provider available: {0}")]
    NoProvider(String),

    /// The consumer went away before the pipeline finished.
    #[error("Request cancelled")]
    Cancelled,

    /// A background task was cancelled or panicked.
    #[error("Task failed: {0}")]
    Task(String),

    /// Storage layer error.
    #[error(transparent)]
    Db(#[from] ragent_db::DbError),

    /// Inference layer error.
    #[error(transparent)]
    Model(#[from] ragent_model::ModelError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagError {
    /// Create an index I/O error.
    pub fn index_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IndexIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an index parse error.
    pub fn index_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IndexParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for RagError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
