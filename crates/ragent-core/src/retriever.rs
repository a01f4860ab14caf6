//! Hybrid retrieval: dense + BM25, fused with RRF, optionally reranked.
//!
//! The retriever owns the index. Readers clone an `Arc` to the current
//! [`IndexSnapshot`] and never hold a lock across a search, so a rebuild
//! swaps the pointer once the new snapshot is complete and in-flight
//! requests finish on the old one.
//!
//! ## Pipeline
//!
//! 1. Embed the query and search the dense index (width W)
//! 2. Search the lexical index (width W), concurrently with step 1
//! 3. Fuse with RRF, or concatenate with dense results winning duplicates
//! 4. Truncate to W, then rerank (or truncate) to `top_k`
//!
//! Failures in steps 1-2 are logged and treated as empty result lists.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use ragent_db::vector::{FlatVectorIndex, MetadataFilter, VectorMetric, VectorRecord};

use crate::bm25::{Bm25Index, HybridSearchConfig};
use crate::embedding::EmbeddingBackend;
use crate::errors::RagError;
use crate::fusion::{concat_dedup, reciprocal_rank_fusion};
use crate::index_store::{IndexManifest, IndexSnapshot, IndexStore};
use crate::reranker::Reranker;
use crate::types::Passage;

// ============================================================================
// RetrievalRequest
// ============================================================================

/// One retrieval call.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub top_k: usize,
    /// Equality filter over passage metadata.
    pub filter: Option<MetadataFilter>,
    /// Override the reranker for this call. `None` uses the retriever's
    /// reranker when one is attached.
    pub rerank: Option<bool>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            filter: None,
            rerank: None,
        }
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = Some(rerank);
        self
    }
}

// ============================================================================
// HybridRetriever
// ============================================================================

/// Dense + lexical retriever with index lifecycle.
pub struct HybridRetriever {
    config: HybridSearchConfig,
    metric: VectorMetric,
    embedder: Arc<dyn EmbeddingBackend>,
    reranker: Reranker,
    store: Option<IndexStore>,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    /// Serializes rebuilds and clears.
    write_lock: Mutex<()>,
}

impl HybridRetriever {
    /// Create a retriever with no index loaded.
    ///
    /// Without a store, rebuilt indexes live only in memory.
    pub fn new(
        config: HybridSearchConfig,
        embedder: Arc<dyn EmbeddingBackend>,
        reranker: Reranker,
        store: Option<IndexStore>,
    ) -> Self {
        Self {
            config,
            metric: VectorMetric::default(),
            embedder,
            reranker,
            store,
            snapshot: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Metric used for dense indexes built by [`Self::index_documents`].
    pub fn with_metric(mut self, metric: VectorMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn config(&self) -> &HybridSearchConfig {
        &self.config
    }

    pub fn reranker(&self) -> &Reranker {
        &self.reranker
    }

    pub fn store(&self) -> Option<&IndexStore> {
        self.store.as_ref()
    }

    /// Whether an index is loaded (possibly empty).
    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Passages in the loaded index, 0 when none is loaded.
    pub fn passage_count(&self) -> usize {
        self.current().map(|s| s.len()).unwrap_or(0)
    }

    /// Install a prebuilt snapshot, replacing the current one.
    pub fn set_snapshot(&self, snapshot: IndexSnapshot) {
        self.swap(Some(Arc::new(snapshot)));
    }

    fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn swap(&self, next: Option<Arc<IndexSnapshot>>) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = next;
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    /// Retrieve up to `top_k` passages for `query`.
    ///
    /// Returns an empty list when no index is loaded; that is "no context",
    /// not a failure.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<Passage> {
        let mut request = RetrievalRequest::new(query, top_k);
        request.filter = filter.cloned();
        self.retrieve_with(request).await
    }

    /// Retrieve with per-call options.
    pub async fn retrieve_with(&self, request: RetrievalRequest) -> Vec<Passage> {
        let Some(snapshot) = self.current() else {
            warn!("Retrieval requested but no index is loaded");
            return Vec::new();
        };
        if snapshot.is_empty() {
            warn!("Retrieval requested but the index holds no passages");
            return Vec::new();
        }

        let start = Instant::now();
        let width = self.config.retrieval_width;
        let filter = request.filter.filter(|f| !f.is_empty());

        let (dense, lexical) = tokio::join!(
            self.dense_search(&snapshot, &request.query, width, filter.clone()),
            self.lexical_search(&snapshot, &request.query, width, filter),
        );

        debug!(
            "Hybrid search for '{}': {} dense, {} lexical candidates",
            request.query,
            dense.len(),
            lexical.len()
        );

        let mut candidates = if self.config.use_rrf {
            reciprocal_rank_fusion(&[dense, lexical], self.config.rrf_k)
        } else {
            concat_dedup(vec![dense, lexical])
        };
        candidates.truncate(width);

        let rerank = request.rerank.unwrap_or(true) && self.reranker.is_enabled();
        let results = if rerank && !candidates.is_empty() {
            self.reranker
                .rerank(&request.query, candidates, request.top_k)
                .await
        } else {
            candidates.truncate(request.top_k);
            candidates
        };

        debug!(
            "Retrieved {} passages in {:?} (rerank: {})",
            results.len(),
            start.elapsed(),
            rerank
        );
        results
    }

    async fn dense_search(
        &self,
        snapshot: &Arc<IndexSnapshot>,
        query: &str,
        width: usize,
        filter: Option<MetadataFilter>,
    ) -> Vec<Passage> {
        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Dense retrieval skipped, query embedding failed: {}", e);
                return Vec::new();
            }
        };

        let snapshot = Arc::clone(snapshot);
        let hits = tokio::task::spawn_blocking(move || {
            let hits = snapshot
                .dense()
                .search(&embedding, width, filter.as_ref())?;
            Ok::<_, RagError>(
                hits.into_iter()
                    .filter_map(|hit| snapshot.passage(hit.position).cloned())
                    .collect::<Vec<_>>(),
            )
        })
        .await
        .map_err(RagError::from)
        .and_then(|r| r);

        hits.unwrap_or_else(|e| {
            warn!("Dense retrieval failed: {}", e);
            Vec::new()
        })
    }

    async fn lexical_search(
        &self,
        snapshot: &Arc<IndexSnapshot>,
        query: &str,
        width: usize,
        filter: Option<MetadataFilter>,
    ) -> Vec<Passage> {
        let snapshot = Arc::clone(snapshot);
        let query = query.to_string();
        let hits = tokio::task::spawn_blocking(move || {
            // The lexical index has no filter support, so filtered searches
            // rank everything and post-filter before cutting to width.
            let limit = if filter.is_some() {
                snapshot.lexical().len()
            } else {
                width
            };
            snapshot
                .lexical()
                .search(&query, limit)
                .into_iter()
                .filter_map(|hit| snapshot.passage(hit.position))
                .filter(|p| filter.as_ref().is_none_or(|f| f.matches(&p.metadata)))
                .take(width)
                .cloned()
                .collect::<Vec<_>>()
        })
        .await;

        hits.unwrap_or_else(|e| {
            warn!("Lexical retrieval failed: {}", e);
            Vec::new()
        })
    }

    // ------------------------------------------------------------------------
    // Index lifecycle
    // ------------------------------------------------------------------------

    /// Rebuild both indexes from `passages` and swap them in.
    ///
    /// The new snapshot is persisted (when a store is configured) before it
    /// becomes visible. On failure the previous index stays in place.
    pub async fn index_documents(&self, passages: Vec<Passage>) -> Result<IndexManifest, RagError> {
        if let Some(position) = passages.iter().position(|p| p.content.trim().is_empty()) {
            return Err(RagError::InvalidPassage {
                position,
                reason: "content is empty".to_string(),
            });
        }

        let _guard = self.write_lock.lock().await;
        let start = Instant::now();

        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts).await?
        };
        if vectors.len() != passages.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                passages.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        let mut dense = FlatVectorIndex::new(dimension, self.metric);
        dense.insert(
            vectors
                .into_iter()
                .zip(&passages)
                .enumerate()
                .map(|(i, (vector, passage))| {
                    VectorRecord::new(i, vector).with_metadata(passage.metadata.clone())
                })
                .collect(),
        )?;
        let lexical = Bm25Index::build(&self.config.bm25, passages.iter().map(|p| &p.content));

        let embedding_model = self.embedder.model_id().to_string();
        let (manifest, dense, lexical, passages) = match self.store.clone() {
            Some(store) => {
                tokio::task::spawn_blocking(move || {
                    let manifest = store.save(&passages, &dense, &lexical, &embedding_model)?;
                    Ok::<_, RagError>((manifest, dense, lexical, passages))
                })
                .await??
            }
            None => {
                let manifest = IndexManifest {
                    version: IndexManifest::CURRENT_VERSION,
                    passage_count: passages.len(),
                    dimension,
                    metric: self.metric,
                    embedding_model,
                    built_at: chrono::Utc::now().to_rfc3339(),
                };
                (manifest, dense, lexical, passages)
            }
        };

        let snapshot = IndexSnapshot::new(passages, Arc::new(dense), Arc::new(lexical))?;
        self.swap(Some(Arc::new(snapshot)));

        info!(
            "Indexed {} passages (dim {}) in {:?}",
            manifest.passage_count,
            manifest.dimension,
            start.elapsed()
        );
        Ok(manifest)
    }

    /// Remove the persisted index and drop the in-memory one.
    pub async fn clear_index(&self) -> Result<(), RagError> {
        let _guard = self.write_lock.lock().await;
        if let Some(store) = self.store.clone() {
            tokio::task::spawn_blocking(move || store.clear()).await??;
        }
        self.swap(None);
        info!("Index cleared");
        Ok(())
    }

    /// Load the persisted index, if any.
    ///
    /// Any failure leaves the retriever with no index and returns `false`;
    /// a corrupt index is never partially loaded.
    pub async fn load_index(&self) -> bool {
        let Some(store) = self.store.clone() else {
            return false;
        };
        let _guard = self.write_lock.lock().await;

        let loaded = tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(RagError::from)
            .and_then(|r| r);

        match loaded {
            Ok(Some((manifest, snapshot))) => {
                if manifest.embedding_model != self.embedder.model_id() {
                    warn!(
                        "Index was built with embedding model '{}' but '{}' is configured",
                        manifest.embedding_model,
                        self.embedder.model_id()
                    );
                }
                self.swap(Some(Arc::new(snapshot)));
                true
            }
            Ok(None) => {
                debug!("No persisted index found");
                self.swap(None);
                false
            }
            Err(e) => {
                error!("Failed to load index, starting without one: {}", e);
                self.swap(None);
                false
            }
        }
    }
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("config", &self.config)
            .field("embedder", &self.embedder.model_id())
            .field("reranker", &self.reranker)
            .field("passages", &self.passage_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reranker::RerankerBackend;
    use async_trait::async_trait;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use tempfile::TempDir;

    /// Bag-of-words hashed into a small vector.
    struct HashEmbedder;

    #[async_trait]
    impl EmbeddingBackend for HashEmbedder {
        fn model_id(&self) -> &str {
            "hash-embedder"
        }

        async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(inputs.iter().map(|t| hash_embed(t)).collect())
        }
    }

    fn hash_embed(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; 16];
        for word in text.to_lowercase().split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            let mut h = DefaultHasher::new();
            word.hash(&mut h);
            v[(h.finish() % 16) as usize] += 1.0;
        }
        v
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingBackend for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }

        async fn embed_batch(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Err(RagError::Embedding("offline".to_string()))
        }
    }

    /// Prefers anything mentioning Rust.
    struct RustScorer;

    #[async_trait]
    impl RerankerBackend for RustScorer {
        fn model_id(&self) -> &str {
            "rust-first"
        }

        async fn score_batch(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>, RagError> {
            Ok(documents
                .iter()
                .map(|d| if d.contains("Rust") { 1.0 } else { 0.0 })
                .collect())
        }
    }

    fn corpus() -> Vec<Passage> {
        vec![
            Passage::new("FAISS is a library for vector search.").with_meta("source", "doc1"),
            Passage::new("Rust is a systems programming language.").with_meta("source", "doc2"),
            Passage::new("BM25 ranks documents by term frequency.").with_meta("source", "doc3"),
        ]
    }

    fn retriever(store: Option<IndexStore>) -> HybridRetriever {
        HybridRetriever::new(
            HybridSearchConfig::default(),
            Arc::new(HashEmbedder),
            Reranker::disabled(),
            store,
        )
    }

    #[tokio::test]
    async fn test_retrieve_without_index_is_empty() {
        let retriever = retriever(None);
        assert!(!retriever.is_loaded());
        assert!(retriever.retrieve("anything", 5, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_finds_relevant_passage() {
        let retriever = retriever(None);
        retriever.index_documents(corpus()).await.unwrap();

        let results = retriever.retrieve("What is FAISS vector search?", 1, None).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("FAISS"));
    }

    #[tokio::test]
    async fn test_filter_applies_to_both_sides() {
        let retriever = retriever(None);
        retriever.index_documents(corpus()).await.unwrap();

        let filter = MetadataFilter::new().with("source", "doc2");
        let results = retriever.retrieve("FAISS vector search", 5, Some(&filter)).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].content.starts_with("Rust"));
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_lexical_results() {
        let retriever = HybridRetriever::new(
            HybridSearchConfig::default(),
            Arc::new(HashEmbedder),
            Reranker::disabled(),
            None,
        );
        retriever.index_documents(corpus()).await.unwrap();
        let snapshot = retriever.current().unwrap();

        let degraded = HybridRetriever::new(
            HybridSearchConfig::default(),
            Arc::new(FailingEmbedder),
            Reranker::disabled(),
            None,
        );
        degraded.swap(Some(snapshot));

        let results = degraded.retrieve("term frequency", 2, None).await;
        assert!(!results.is_empty());
        assert!(results[0].content.contains("BM25"));
    }

    #[tokio::test]
    async fn test_rerank_override() {
        let retriever = HybridRetriever::new(
            HybridSearchConfig::default(),
            Arc::new(HashEmbedder),
            Reranker::new(Arc::new(RustScorer)),
            None,
        );
        retriever.index_documents(corpus()).await.unwrap();

        let reranked = retriever
            .retrieve_with(RetrievalRequest::new("FAISS", 3))
            .await;
        assert!(reranked[0].content.starts_with("Rust"));

        let plain = retriever
            .retrieve_with(RetrievalRequest::new("FAISS", 3).with_rerank(false))
            .await;
        assert!(plain[0].content.contains("FAISS"));
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let retriever = retriever(None);
        let mut passages = corpus();
        passages.push(Passage::new("   "));

        let err = retriever.index_documents(passages).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidPassage { position: 3, .. }));
        assert!(!retriever.is_loaded());
    }

    #[tokio::test]
    async fn test_empty_corpus_builds_empty_index() {
        let retriever = retriever(None);
        let manifest = retriever.index_documents(Vec::new()).await.unwrap();
        assert_eq!(manifest.passage_count, 0);
        assert!(retriever.is_loaded());
        assert!(retriever.retrieve("anything", 3, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let temp = TempDir::new().unwrap();
        let writer = retriever(Some(IndexStore::new(temp.path())));
        writer.index_documents(corpus()).await.unwrap();

        let reader = retriever(Some(IndexStore::new(temp.path())));
        assert!(reader.load_index().await);
        assert_eq!(reader.passage_count(), 3);

        reader.clear_index().await.unwrap();
        assert!(!reader.is_loaded());
        assert!(!IndexStore::new(temp.path()).exists());
    }

    #[tokio::test]
    async fn test_corrupt_index_loads_as_absent() {
        let temp = TempDir::new().unwrap();
        let writer = retriever(Some(IndexStore::new(temp.path())));
        writer.index_documents(corpus()).await.unwrap();

        std::fs::write(
            IndexStore::new(temp.path()).current_dir().join("passages.json"),
            "not json",
        )
        .unwrap();

        let reader = retriever(Some(IndexStore::new(temp.path())));
        assert!(!reader.load_index().await);
        assert!(!reader.is_loaded());
    }
}
