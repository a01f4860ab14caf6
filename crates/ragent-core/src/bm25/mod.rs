//! BM25 lexical (sparse) retrieval for hybrid search.
//!
//! Complements dense retrieval over the same passage corpus. The two ranked
//! lists are merged by [`crate::fusion`].
//!
//! ## Architecture
//!
//! ```text
//! Query
//!   │
//!   ├──► Dense Retrieval (embedding + flat vector index)
//!   │        └──► W candidates
//!   │
//!   └──► Sparse Retrieval (BM25 inverted index)
//!            └──► W candidates (metadata post-filter)
//!                      │
//!                      ▼
//!           Reciprocal Rank Fusion (or concat + dedup)
//!                      │
//!                      ▼
//!              Cross-Encoder Reranker
//!                      │
//!                      ▼
//!                  top_k passages
//! ```
//!
//! ## Key Components
//!
//! - [`tokenizer`]: Unicode-aware tokenization with Porter stemmer
//! - [`index`]: BM25 inverted index and scoring
//! - [`scorer`]: BM25 scoring algorithm (k1=1.2, b=0.75)
//! - [`storage`]: Serialization/deserialization with bincode

mod index;
mod scorer;
mod storage;
mod tokenizer;

pub use index::{Bm25Index, Bm25IndexStats};
pub use scorer::{bm25_term_score, idf, Bm25Params};
pub use storage::{load_bm25_index, save_bm25_index, Bm25IndexMeta, BM25_DIR_NAME};
pub use tokenizer::{Tokenizer, TokenizerConfig};

use serde::{Deserialize, Serialize};

use crate::errors::RagError;

// ============================================================================
// Configuration
// ============================================================================

/// BM25 configuration.
///
/// Controls tokenization and scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25Config {
    /// Term frequency saturation. Default: 1.2
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Document length normalization, 0 (none) to 1 (full). Default: 0.75
    #[serde(default = "default_b")]
    pub b: f32,

    /// Whether to apply Porter stemming to tokens.
    #[serde(default = "default_stemming")]
    pub stemming: bool,

    /// Whether to remove English stop words during tokenization.
    #[serde(default = "default_remove_stopwords")]
    pub remove_stopwords: bool,

    /// Minimum token length to include.
    #[serde(default = "default_min_token_length")]
    pub min_token_length: usize,
}

fn default_k1() -> f32 {
    1.2
}

fn default_b() -> f32 {
    0.75
}

fn default_stemming() -> bool {
    true
}

fn default_remove_stopwords() -> bool {
    true
}

fn default_min_token_length() -> usize {
    2
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            stemming: default_stemming(),
            remove_stopwords: default_remove_stopwords(),
            min_token_length: default_min_token_length(),
        }
    }
}

// ============================================================================
// Hybrid Search Configuration
// ============================================================================

/// Hybrid search configuration combining dense and sparse retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridSearchConfig {
    /// Merge the two ranked lists with RRF. When false, the lists are
    /// concatenated (dense first) and deduplicated.
    #[serde(default = "default_use_rrf")]
    pub use_rrf: bool,

    /// RRF k parameter. Formula: RRF(d) = Σ 1/(k + rank), rank zero-based.
    /// Default: 60
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Candidates fetched from each strategy and kept after fusion (W).
    /// Default: 50
    #[serde(default = "default_retrieval_width")]
    pub retrieval_width: usize,

    /// BM25 configuration.
    #[serde(default)]
    pub bm25: Bm25Config,
}

fn default_use_rrf() -> bool {
    true
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_retrieval_width() -> usize {
    50
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            use_rrf: default_use_rrf(),
            rrf_k: default_rrf_k(),
            retrieval_width: default_retrieval_width(),
            bm25: Bm25Config::default(),
        }
    }
}

impl HybridSearchConfig {
    /// Validates the hybrid search configuration, returning warnings for questionable values.
    ///
    /// # Errors
    /// Returns an error if:
    /// - `rrf_k` is 0 or negative (the top rank would contribute 1/0)
    /// - `retrieval_width` is 0
    /// - BM25 `k1` or `b` is out of range
    ///
    /// # Warnings
    /// - Very large rrf_k (> 100) which may over-smooth rankings
    pub fn validate(&self) -> Result<Vec<String>, RagError> {
        let mut warnings = Vec::new();

        if self.rrf_k <= 0.0 {
            return Err(RagError::InvalidConfiguration {
                message: "retrieval.hybrid.rrfK must be positive".to_string(),
                hint: "Set rrfK to a positive value (recommended: 60)".to_string(),
            });
        }

        if self.retrieval_width == 0 {
            return Err(RagError::InvalidConfiguration {
                message: "retrieval.hybrid.retrievalWidth cannot be 0".to_string(),
                hint: "Set retrievalWidth to at least 1 (recommended: 50)".to_string(),
            });
        }

        if self.bm25.k1 < 0.0 {
            return Err(RagError::InvalidConfiguration {
                message: "retrieval.hybrid.bm25.k1 cannot be negative".to_string(),
                hint: "Set k1 between 1.2 and 2.0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(RagError::InvalidConfiguration {
                message: "retrieval.hybrid.bm25.b must be within [0, 1]".to_string(),
                hint: "Set b to 0.75 unless passages have uniform length".to_string(),
            });
        }

        if self.rrf_k > 100.0 {
            warnings.push(format!(
                "retrieval.hybrid.rrfK={} is very large; rankings will be heavily smoothed (recommended: 60)",
                self.rrf_k
            ));
        }

        if self.retrieval_width > 1000 {
            warnings.push(format!(
                "retrieval.hybrid.retrievalWidth ({}) is very large; fusion and reranking will slow down",
                self.retrieval_width
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// Search Results
// ============================================================================

/// Result from BM25 search.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25SearchResult {
    /// Position of the passage in the indexed corpus.
    pub position: usize,
    /// BM25 score.
    pub score: f32,
    /// Rank in the BM25 result list (zero-based).
    pub rank: usize,
}
