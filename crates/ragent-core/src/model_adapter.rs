//! Adapter layer for ragent-model infrastructure.
//!
//! This module bridges the HTTP clients in `ragent-model` with the seams the
//! core pipeline is written against:
//!
//! - Error conversion from `ModelError` to `RagError`
//! - Wrapper types implementing [`EmbeddingBackend`], [`RerankerBackend`] and
//!   [`GenerationProvider`] on top of `ragent-model` clients
//! - Factories that build those wrappers from [`RagConfig`]
//!
//! ## Architecture
//!
//! ```text
//! ragent-core domain code (retriever, orchestrator)
//!        ↓
//!   model_adapter (this module) - wrappers + conversions
//!        ↓
//!     ragent-model clients (embeddings, rerank, chat)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use ragent_model::{ChatMessage, ChatModel, EmbeddingModel, ModelError, RerankerModel};

use crate::config::RagConfig;
use crate::embedding::EmbeddingBackend;
use crate::errors::RagError;
use crate::generation::{
    GenerationProvider, GenerationRequest, ProviderKind, ProviderRegistry, TextStream,
};
use crate::reranker::RerankerBackend;

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a ragent-model error to a ragent-core error.
pub fn from_model_error(err: ModelError) -> RagError {
    match err {
        ModelError::EmbeddingFailed { model_id, message } => {
            RagError::Embedding(format!("{model_id}: {message}"))
        }
        ModelError::RerankingFailed { model_id, message } => {
            RagError::Reranker(format!("{model_id}: {message}"))
        }
        other => RagError::Model(other),
    }
}

/// Extension trait to convert ragent-model results.
pub trait IntoRagResult<T> {
    fn into_rag_result(self) -> Result<T, RagError>;
}

impl<T> IntoRagResult<T> for Result<T, ModelError> {
    fn into_rag_result(self) -> Result<T, RagError> {
        self.map_err(from_model_error)
    }
}

// ============================================================================
// Embedding Backend Wrapper
// ============================================================================

/// [`EmbeddingBackend`] over a ragent-model embedding client.
#[derive(Debug)]
pub struct ModelEmbeddingBackend {
    inner: Box<dyn EmbeddingModel>,
}

impl ModelEmbeddingBackend {
    pub fn new(model: Box<dyn EmbeddingModel>) -> Self {
        Self { inner: model }
    }
}

#[async_trait]
impl EmbeddingBackend for ModelEmbeddingBackend {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.inner.embed(inputs).await.into_rag_result()
    }
}

// ============================================================================
// Reranker Backend Wrapper
// ============================================================================

/// [`RerankerBackend`] over a ragent-model cross-encoder client.
#[derive(Debug)]
pub struct ModelRerankerBackend {
    inner: Box<dyn RerankerModel>,
}

impl ModelRerankerBackend {
    pub fn new(model: Box<dyn RerankerModel>) -> Self {
        Self { inner: model }
    }
}

#[async_trait]
impl RerankerBackend for ModelRerankerBackend {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RagError> {
        self.inner.score_batch(query, documents).await.into_rag_result()
    }
}

// ============================================================================
// Generation Provider Wrapper
// ============================================================================

/// [`GenerationProvider`] over a ragent-model chat client.
///
/// The assembled prompt is sent as a single user message.
#[derive(Debug)]
pub struct ChatModelProvider {
    kind: ProviderKind,
    model: Arc<dyn ChatModel>,
}

impl ChatModelProvider {
    pub fn new(kind: ProviderKind, model: Arc<dyn ChatModel>) -> Self {
        Self { kind, model }
    }

    fn error(&self, err: ModelError) -> RagError {
        RagError::generation(self.kind.as_str(), err.to_string())
    }
}

#[async_trait]
impl GenerationProvider for ChatModelProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model_id(&self) -> &str {
        self.model.model_id()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, RagError> {
        let messages = [ChatMessage::user(request.to_prompt())];
        self.model
            .complete(&messages, request.model.as_deref())
            .await
            .map_err(|e| self.error(e))
    }

    async fn stream_generate(&self, request: &GenerationRequest) -> Result<TextStream, RagError> {
        let messages = [ChatMessage::user(request.to_prompt())];
        let fragments = self
            .model
            .complete_stream(&messages, request.model.as_deref())
            .await
            .map_err(|e| self.error(e))?;

        let provider = self.kind.as_str();
        Ok(fragments
            .map(move |item| item.map_err(|e| RagError::generation(provider, e.to_string())))
            .boxed())
    }

    async fn health_check(&self) -> Result<(), RagError> {
        self.model.ping().await.map_err(|e| self.error(e))
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create the embedding backend described by `config.embedding`.
pub fn create_embedding_backend(config: &RagConfig) -> Result<Arc<dyn EmbeddingBackend>, RagError> {
    let model = ragent_model::create_embedding_model(&config.embedding.endpoint).into_rag_result()?;
    Ok(Arc::new(ModelEmbeddingBackend::new(model)))
}

/// Create the reranker backend, or `None` when reranking is disabled.
///
/// `retrieval.reranker.modelId` overrides the model id of the endpoint
/// settings.
pub fn create_reranker_backend(
    config: &RagConfig,
) -> Result<Option<Arc<dyn RerankerBackend>>, RagError> {
    if !config.retrieval.reranker.enabled {
        debug!("Reranker disabled by configuration");
        return Ok(None);
    }
    let endpoint = ragent_model::RerankerConfig {
        model_id: config.retrieval.reranker.model_id.clone(),
        ..config.reranking.clone()
    };
    let model = ragent_model::create_reranker_model(&endpoint).into_rag_result()?;
    Ok(Some(Arc::new(ModelRerankerBackend::new(model))))
}

/// Build a registry holding every provider that is enabled and has the
/// credentials it needs.
///
/// Providers that cannot be constructed are skipped with a warning. When the
/// configured default is among the skipped, the first available provider
/// becomes the default. The registry may end up empty.
pub fn create_provider_registry(config: &RagConfig) -> ProviderRegistry {
    let timeout = config.generation.request_timeout_secs;
    let mut providers: Vec<Arc<dyn GenerationProvider>> = Vec::new();

    for kind in ProviderKind::ALL {
        let Some(chat_config) = config.providers.chat_config(kind, timeout) else {
            debug!("Provider '{}' is disabled or has no API key", kind);
            continue;
        };
        match ragent_model::create_chat_model(&chat_config) {
            Ok(model) => providers.push(Arc::new(ChatModelProvider::new(kind, Arc::from(model)))),
            Err(e) => warn!("Skipping provider '{}': {}", kind, e),
        }
    }

    let configured = config.generation.default_kind();
    let default = if providers.iter().any(|p| p.kind() == configured) {
        configured
    } else if let Some(first) = providers.first() {
        warn!(
            "Default provider '{}' is unavailable, using '{}'",
            configured,
            first.kind()
        );
        first.kind()
    } else {
        configured
    };

    let mut registry = ProviderRegistry::new(default);
    for provider in providers {
        registry.register(provider);
    }

    info!(
        "Generation providers: [{}] (default: {})",
        registry
            .providers()
            .map(|p| p.kind().as_str())
            .collect::<Vec<_>>()
            .join(", "),
        registry.default_kind()
    );
    registry
}

// ============================================================================
// Tests
// ============================================================================
