//! Shared test doubles for ragent-core integration tests.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use ragent_core::{
    ExpansionConfig, GenerationProvider, GenerationRequest, MemoryConfig, ProviderKind,
    ProviderRegistry, RagConfig, RagEngine, RagError, RerankerBackend, TextStream,
};
use ragent_core::{Bm25SearchResult, EmbeddingBackend, EngineComponents, LexicalIndex, Passage};
use ragent_db::vector::{MetadataFilter, VectorIndexBackend, VectorMetric, VectorSearchResult};
use ragent_db::DbResult;

pub const DIM: usize = 32;

// ============================================================================
// Embedding
// ============================================================================

/// Bag-of-words hashed into [`DIM`] buckets. Deterministic.
pub struct HashEmbedder;

pub fn hash_embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    for word in text.to_lowercase().split_whitespace() {
        let word: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if word.is_empty() {
            continue;
        }
        let mut h = DefaultHasher::new();
        word.hash(&mut h);
        v[(h.finish() % DIM as u64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingBackend for HashEmbedder {
    fn model_id(&self) -> &str {
        "hash-embedder"
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(inputs.iter().map(|t| hash_embed(t)).collect())
    }
}

// ============================================================================
// Reranking
// ============================================================================

/// Scores by the number of query words found in the document.
pub struct OverlapScorer {
    pub calls: Mutex<Vec<usize>>,
}

impl OverlapScorer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Candidate counts seen by each call.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RerankerBackend for OverlapScorer {
    fn model_id(&self) -> &str {
        "overlap"
    }

    async fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RagError> {
        self.calls.lock().unwrap().push(documents.len());
        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();
        Ok(documents
            .iter()
            .map(|d| {
                let d = d.to_lowercase();
                words.iter().filter(|w| d.contains(*w)).count() as f32
            })
            .collect())
    }
}

/// Always fails.
pub struct FailingScorer;

#[async_trait]
impl RerankerBackend for FailingScorer {
    fn model_id(&self) -> &str {
        "failing"
    }

    async fn score_batch(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>, RagError> {
        Err(RagError::Reranker("scorer offline".to_string()))
    }
}

// ============================================================================
// Generation
// ============================================================================

/// How [`ScriptedProvider`] streams its answer.
#[derive(Clone)]
pub enum StreamScript {
    /// "Answer: " followed by the context.
    Echo,
    /// One fragment, then an error.
    FailAfterFirst,
    /// `count` slow fragments, counting each one produced.
    Slow { count: usize, produced: Arc<AtomicUsize> },
}

/// Echoes context for grounded requests and returns a fixed reply for raw
/// ones (expansion, contextualization). Records every request.
pub struct ScriptedProvider {
    kind: ProviderKind,
    raw_reply: String,
    fail_generate: bool,
    stream: StreamScript,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn echo(raw_reply: &str) -> Arc<Self> {
        Self::build(ProviderKind::Local, raw_reply, false, StreamScript::Echo)
    }

    pub fn with_kind(kind: ProviderKind, raw_reply: &str) -> Arc<Self> {
        Self::build(kind, raw_reply, false, StreamScript::Echo)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(ProviderKind::Local, "", true, StreamScript::FailAfterFirst)
    }

    pub fn streaming(raw_reply: &str, stream: StreamScript) -> Arc<Self> {
        Self::build(ProviderKind::Local, raw_reply, false, stream)
    }

    fn build(kind: ProviderKind, raw_reply: &str, fail_generate: bool, stream: StreamScript) -> Arc<Self> {
        Arc::new(Self {
            kind,
            raw_reply: raw_reply.to_string(),
            fail_generate,
            stream,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Grounded (answer) requests, in call order.
    pub fn grounded_requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.instruction.is_some())
            .cloned()
            .collect()
    }

    /// Raw (expansion/rewrite) requests, in call order.
    pub fn raw_requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.instruction.is_none())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, RagError> {
        self.requests.lock().unwrap().push(request.clone());
        if request.instruction.is_none() {
            return Ok(self.raw_reply.clone());
        }
        if self.fail_generate {
            return Err(RagError::generation(self.kind.as_str(), "model overloaded"));
        }
        Ok(format!("Answer: {}", request.context))
    }

    async fn stream_generate(&self, request: &GenerationRequest) -> Result<TextStream, RagError> {
        self.requests.lock().unwrap().push(request.clone());
        let provider = self.kind.as_str();
        match self.stream.clone() {
            StreamScript::Echo => Ok(futures::stream::iter(vec![
                Ok("Answer: ".to_string()),
                Ok(request.context.clone()),
            ])
            .boxed()),
            StreamScript::FailAfterFirst => Ok(futures::stream::iter(vec![
                Ok("partial".to_string()),
                Err(RagError::generation(provider, "connection reset")),
            ])
            .boxed()),
            StreamScript::Slow { count, produced } => {
                Ok(futures::stream::unfold(0usize, move |i| {
                    let produced = Arc::clone(&produced);
                    async move {
                        if i >= count {
                            return None;
                        }
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        produced.fetch_add(1, Ordering::SeqCst);
                        Some((Ok(format!("tok{i} ")), i + 1))
                    }
                })
                .boxed())
            }
        }
    }

    async fn health_check(&self) -> Result<(), RagError> {
        if self.fail_generate {
            Err(RagError::generation(self.kind.as_str(), "unreachable"))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Call-recording dense index
// ============================================================================

/// One recorded search call: requested limit and hits returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCall {
    pub limit: usize,
    pub returned: usize,
}

/// Index wrapper recording every search, for dense or lexical indexes.
pub struct RecordingIndex<I> {
    inner: I,
    pub calls: Arc<Mutex<Vec<SearchCall>>>,
}

impl<I> RecordingIndex<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<I: VectorIndexBackend> VectorIndexBackend for RecordingIndex<I> {
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> DbResult<Vec<VectorSearchResult>> {
        let hits = self.inner.search(query, limit, filter)?;
        self.calls.lock().unwrap().push(SearchCall {
            limit,
            returned: hits.len(),
        });
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn metric(&self) -> VectorMetric {
        self.inner.metric()
    }
}

impl<I: LexicalIndex> LexicalIndex for RecordingIndex<I> {
    fn search(&self, query: &str, limit: usize) -> Vec<Bm25SearchResult> {
        let hits = self.inner.search(query, limit);
        self.calls.lock().unwrap().push(SearchCall {
            limit,
            returned: hits.len(),
        });
        hits
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

// ============================================================================
// Engine builders
// ============================================================================

/// Config with in-memory persistence and expansion to `count` queries.
pub fn test_config(expansion_count: usize) -> RagConfig {
    let mut config = RagConfig::default();
    config.expansion = ExpansionConfig {
        enabled: true,
        count: expansion_count,
    };
    config.memory = MemoryConfig {
        history_limit: 3,
        persist_path: None,
    };
    config
}

/// Engine over mocks, with no index store.
pub fn engine_with(
    config: RagConfig,
    provider: Arc<ScriptedProvider>,
    reranker: Option<Arc<dyn RerankerBackend>>,
) -> RagEngine {
    let kind = provider.kind();
    let registry = ProviderRegistry::new(kind).with_provider(provider);
    RagEngine::with_components(
        config,
        EngineComponents {
            embedder: Arc::new(HashEmbedder),
            reranker,
            providers: registry,
            store: None,
        },
    )
}

pub fn faiss_corpus() -> Vec<Passage> {
    vec![Passage::new("FAISS is a library for vector search.").with_meta("source", "doc1")]
}

/// A dozen passages about assorted topics.
pub fn topic_corpus() -> Vec<Passage> {
    [
        "FAISS is a library for vector search.",
        "BM25 ranks documents by term frequency and inverse document frequency.",
        "Reciprocal rank fusion merges ranked lists without score normalization.",
        "Rust guarantees memory safety without a garbage collector.",
        "Tokio is an asynchronous runtime for Rust.",
        "Cross-encoders score query and document pairs jointly.",
        "Vector databases store embeddings for similarity search.",
        "Query expansion generates alternate phrasings to widen recall.",
        "Conversation memory keeps the most recent turns of a session.",
        "Dense retrieval embeds queries and documents in the same space.",
        "Stemming reduces words to a common root form.",
        "Stopwords are frequent words removed before indexing.",
    ]
    .iter()
    .enumerate()
    .map(|(i, text)| Passage::new(*text).with_meta("source", format!("doc{}", i + 1)))
    .collect()
}
