//! # ragent-core
//!
//! **Retrieval-augmented answering** – core engine library.
//!
//! This crate provides the retrieval pipeline, conversation memory and
//! generation orchestration for ragent. It is designed to be consumed by the
//! `ragent` CLI and other Rust tools.
//!
//! ## Main Types
//!
//! - [`RagEngine`] – composition root and entry point for all operations
//! - [`Orchestrator`] – mode-driven pipeline (full answer and streaming)
//! - [`HybridRetriever`] – dense + BM25 retrieval with RRF and reranking
//! - [`RagError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`bm25`] – lexical index (tokenizer, scorer, persistence)
//! - [`fusion`] – reciprocal rank fusion
//! - [`retriever`] – hybrid retrieval and index lifecycle
//! - [`index_store`] – on-disk index snapshots
//! - [`reranker`] – cross-encoder reranking with fallback
//! - [`query_expansion`] – LLM multi-query expansion
//! - [`memory`] – bounded per-session history
//! - [`generation`] – generation providers and selection
//! - [`orchestrator`] – modes, `process_query`, `stream_chat`
//! - [`config`] – YAML configuration
//!
//! ## Example
//!
//! ```ignore
//! use ragent_core::{Mode, Passage, QueryRequest, RagConfig, RagEngine};
//!
//! let engine = RagEngine::from_config(RagConfig::load_default()?).await?;
//! engine
//!     .index_documents(vec![Passage::new("FAISS is a library for vector search.")])
//!     .await?;
//!
//! let response = engine
//!     .process_query(QueryRequest::new("What is FAISS?").with_mode(Mode::Simple))
//!     .await?;
//! println!("{} ({} citations)", response.answer, response.citations.len());
//! ```

// Modules
pub mod bm25;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod fusion;
pub mod generation;
pub mod index_store;
pub mod memory;
pub mod model_adapter;
pub mod orchestrator;
pub mod prompt;
pub mod query_expansion;
pub mod reranker;
pub mod retriever;
pub mod types;

// Re-exports for convenience
pub use bm25::{
    load_bm25_index, save_bm25_index, Bm25Config, Bm25Index, Bm25SearchResult,
    HybridSearchConfig, Tokenizer as Bm25Tokenizer, BM25_DIR_NAME,
};
pub use config::{
    EmbeddingSettings, GenerationConfig, ModesConfig, ProviderConfig, ProvidersConfig, RagConfig,
    RerankerSettings, RetrievalConfig, CONFIG_FILENAME, RAGENT_HOME_DIR,
};
pub use embedding::EmbeddingBackend;
pub use engine::{EngineComponents, EngineStatus, ProviderStatus, RagEngine};
pub use errors::RagError;
pub use fusion::{concat_dedup, reciprocal_rank_fusion, reciprocal_rank_fusion_scored, DEFAULT_RRF_K};
pub use generation::{
    GenerationProvider, GenerationRequest, ProviderKind, ProviderRegistry, TextStream,
};
pub use index_store::{IndexManifest, IndexSnapshot, IndexStore, LexicalIndex};
pub use memory::{MemoryConfig, MemoryManager};
pub use model_adapter::{
    create_embedding_backend, create_provider_registry, create_reranker_backend,
    from_model_error, ChatModelProvider, ModelEmbeddingBackend, ModelRerankerBackend,
};
pub use orchestrator::{
    ChatRequest, ChatStream, Mode, ModePlan, Orchestrator, PipelineStage, QueryRequest,
    QueryResponse, StreamEvent,
};
pub use query_expansion::{ExpansionConfig, QueryExpander};
pub use reranker::{Reranker, RerankerBackend};
pub use retriever::{HybridRetriever, RetrievalRequest};
pub use types::{
    dedup_by_content, Citation, Message, Metadata, MetadataFilter, MetadataValue, Passage, Role,
};
