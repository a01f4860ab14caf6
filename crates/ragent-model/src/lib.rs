//! # ragent-model
//!
//! Inference layer for ragent: embeddings, cross-encoder reranking and chat
//! generation, all served by remote (or local) HTTP endpoints.
//!
//! ## Design Principles
//!
//! 1. **Production-only**: No mock implementations. Test doubles live in consuming crates.
//! 2. **Provider-agnostic**: Traits don't leak wire formats.
//! 3. **Async at the seam**: Every call suspends on network I/O, so the traits
//!    are async and the clients never block a runtime thread.
//!
//! ## Usage
//!
//! ```ignore
//! use ragent_model::{create_chat_model, ChatConfig, ChatMessage};
//!
//! let model = create_chat_model(&ChatConfig::default())?;
//! let answer = model.complete(&[ChatMessage::user("Hello")], None).await?;
//! ```

pub mod chat;
pub mod config;
pub mod error;
mod embedding;
mod http;
mod reranker;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;

// Re-export error types
pub use error::{ModelError, ModelResult};

// Re-export config types (canonical source of truth)
pub use config::{
    ChatApiKind, ChatConfig, EmbeddingConfig, RerankerConfig, DEFAULT_LOCAL_BASE_URL,
    DEFAULT_RERANKER_BASE_URL,
};

pub use chat::{ChatMessage, ChatRole, GeminiChatModel, OpenAiChatModel};
pub use embedding::HttpEmbeddingModel;
pub use reranker::HttpRerankerModel;

/// Default embedding model name.
pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "all-minilm";
/// Default cross-encoder model identifier.
pub const DEFAULT_RERANKER_MODEL_ID: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

/// Lazily produced text fragments of a streamed completion.
///
/// Finite and not restartable: regenerating means issuing a new request.
pub type FragmentStream = BoxStream<'static, ModelResult<String>>;

// ============================================================================
// Embedding Model Trait
// ============================================================================

/// Trait for embedding models (bi-encoders).
///
/// Implementations must return one vector per input, in input order, and be
/// deterministic for identical input and configuration.
#[async_trait]
pub trait EmbeddingModel: Send + Sync + std::fmt::Debug {
    /// Generate embeddings for a batch of texts.
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>>;

    /// Get the model ID.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Reranker Model Trait
// ============================================================================

/// Trait for reranker models (cross-encoders).
///
/// Scores query-document pairs; higher scores indicate more relevant
/// documents. No fixed score range is assumed.
#[async_trait]
pub trait RerankerModel: Send + Sync + std::fmt::Debug {
    /// Score a batch of documents against a query, in document order.
    async fn score_batch(&self, query: &str, documents: &[String]) -> ModelResult<Vec<f32>>;

    /// Get the model ID.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Chat Model Trait
// ============================================================================

/// Trait for chat-completion models.
#[async_trait]
pub trait ChatModel: Send + Sync + std::fmt::Debug {
    /// Produce a complete answer. `model` overrides the configured model name.
    async fn complete(&self, messages: &[ChatMessage], model: Option<&str>) -> ModelResult<String>;

    /// Produce an answer incrementally.
    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> ModelResult<FragmentStream>;

    /// Cheap reachability check against the endpoint.
    async fn ping(&self) -> ModelResult<()>;

    /// Configured model name.
    fn model_id(&self) -> &str;

    /// Wire protocol this client speaks.
    fn api(&self) -> ChatApiKind;
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create an embedding model from configuration.
pub fn create_embedding_model(config: &EmbeddingConfig) -> ModelResult<Box<dyn EmbeddingModel>> {
    Ok(Box::new(HttpEmbeddingModel::new(config)?))
}

/// Create a reranker model from configuration.
pub fn create_reranker_model(config: &RerankerConfig) -> ModelResult<Box<dyn RerankerModel>> {
    Ok(Box::new(HttpRerankerModel::new(config)?))
}

/// Create a chat model speaking the configured wire protocol.
pub fn create_chat_model(config: &ChatConfig) -> ModelResult<Box<dyn ChatModel>> {
    match config.api {
        ChatApiKind::OpenAiCompatible => Ok(Box::new(OpenAiChatModel::new(config)?)),
        ChatApiKind::Gemini => Ok(Box::new(GeminiChatModel::new(config)?)),
    }
}
