//! Cross-encoder reranking with graceful degradation.
//!
//! Second stage after hybrid retrieval: every (query, passage) pair is scored
//! by an external pairwise model and the candidates are reordered. Reranking
//! only improves quality, so a failing or missing scorer falls back to the
//! pre-rerank order.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::RagError;
use crate::types::Passage;

/// Trait for pairwise relevance scorers.
#[async_trait]
pub trait RerankerBackend: Send + Sync {
    /// Get the model ID this backend uses.
    fn model_id(&self) -> &str;

    /// Score each document against the query, in document order.
    /// Higher is more relevant; no fixed range.
    async fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RagError>;
}

/// Reranker over an optional scoring backend.
#[derive(Clone, Default)]
pub struct Reranker {
    backend: Option<Arc<dyn RerankerBackend>>,
}

impl Reranker {
    /// Reranker backed by a scorer.
    pub fn new(backend: Arc<dyn RerankerBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Reranker without a scorer; always truncates.
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// Whether a scoring backend is attached.
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Reorder `candidates` by relevance to `query` and keep the best `top_k`.
    ///
    /// Sorting is stable, so equal scores keep their pre-rerank order. Any
    /// scorer failure returns the first `top_k` candidates unchanged.
    pub async fn rerank(&self, query: &str, candidates: Vec<Passage>, top_k: usize) -> Vec<Passage> {
        let Some(backend) = &self.backend else {
            return truncated(candidates, top_k);
        };
        if candidates.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let documents: Vec<String> = candidates.iter().map(|p| p.content.clone()).collect();
        let scores = match backend.score_batch(query, &documents).await {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                warn!(
                    "Reranker '{}' returned {} scores for {} candidates, keeping retrieval order",
                    backend.model_id(),
                    scores.len(),
                    candidates.len()
                );
                return truncated(candidates, top_k);
            }
            Err(e) => {
                warn!(
                    "Reranker '{}' failed, keeping retrieval order: {}",
                    backend.model_id(),
                    e
                );
                return truncated(candidates, top_k);
            }
        };

        let mut scored: Vec<(Passage, f32)> = candidates.into_iter().zip(scores).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        debug!(
            "Reranked {} candidates, keeping top {}",
            scored.len(),
            top_k.min(scored.len())
        );

        scored.into_iter().take(top_k).map(|(p, _)| p).collect()
    }
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("model_id", &self.backend.as_ref().map(|b| b.model_id()))
            .finish()
    }
}

fn truncated(mut candidates: Vec<Passage>, top_k: usize) -> Vec<Passage> {
    candidates.truncate(top_k);
    candidates
}
