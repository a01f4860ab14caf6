//! Vector index traits and core types.

use std::fmt;
use std::str::FromStr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use super::metadata::{Metadata, MetadataFilter};
use crate::error::DbResult;

// ============================================================================
// VectorMetric
// ============================================================================

/// Distance metric for vector similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Dot product.
    Dot,
    /// Euclidean (L2) distance, reported negated so higher is better.
    L2,
}

impl VectorMetric {
    /// Get the metric name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Dot => "dot",
            VectorMetric::L2 => "l2",
        }
    }
}

impl fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VectorMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(format!("unknown vector metric '{}'", other)),
        }
    }
}

// ============================================================================
// VectorRecord
// ============================================================================

/// A vector to store in the index.
///
/// `position` is the caller's key for the record, typically the passage's
/// offset in the corpus the index was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct VectorRecord {
    /// Caller-assigned position of the source passage.
    pub position: usize,

    /// The embedding vector.
    pub vector: Vec<f32>,

    /// Metadata used by search-time equality filters.
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorRecord {
    /// Create a new record with empty metadata.
    pub fn new(position: usize, vector: Vec<f32>) -> Self {
        Self {
            position,
            vector,
            metadata: Metadata::new(),
        }
    }

    /// Attach metadata to the record.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// ============================================================================
// VectorSearchResult
// ============================================================================

/// A single hit from a similarity search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorSearchResult {
    /// Position of the matching record.
    pub position: usize,

    /// Similarity score (higher is more similar for every metric).
    pub score: f32,
}

// ============================================================================
// VectorIndexBackend Trait
// ============================================================================

/// Read-side contract of a dense vector index.
///
/// Implementations must be safe to query from several threads at once.
pub trait VectorIndexBackend: Send + Sync {
    /// Return up to `limit` records most similar to `query`, best first.
    ///
    /// When `filter` is given, only records whose metadata matches it are
    /// considered.
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> DbResult<Vec<VectorSearchResult>>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    /// Whether the index holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension every stored vector has.
    fn dimension(&self) -> usize;

    /// Metric used to score candidates.
    fn metric(&self) -> VectorMetric;
}
