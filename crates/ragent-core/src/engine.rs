//! RagEngine – the composition root for ragent.
//!
//! The [`RagEngine`] builds every pipeline component exactly once from a
//! [`RagConfig`] and hands out the operations the CLI (or any other front
//! end) needs: answering, streaming chat, index lifecycle, session
//! inspection and health status.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RagConfig;
use crate::embedding::EmbeddingBackend;
use crate::errors::RagError;
use crate::generation::{ProviderKind, ProviderRegistry};
use crate::index_store::{IndexManifest, IndexStore};
use crate::memory::MemoryManager;
use crate::model_adapter::{
    create_embedding_backend, create_provider_registry, create_reranker_backend,
};
use crate::orchestrator::{ChatRequest, ChatStream, Orchestrator, QueryRequest, QueryResponse};
use crate::query_expansion::QueryExpander;
use crate::reranker::{Reranker, RerankerBackend};
use crate::retriever::HybridRetriever;
use crate::types::{Message, Passage};

// ============================================================================
// EngineComponents
// ============================================================================

/// Collaborators injected into [`RagEngine::with_components`].
pub struct EngineComponents {
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub reranker: Option<Arc<dyn RerankerBackend>>,
    pub providers: ProviderRegistry,
    /// Where the index is persisted; `None` keeps it in memory only.
    pub store: Option<IndexStore>,
}

// ============================================================================
// Status
// ============================================================================

/// Reachability of one generation provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub provider: ProviderKind,
    pub model: String,
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot of engine health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub index_loaded: bool,
    pub passage_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_dir: Option<PathBuf>,
    pub default_provider: ProviderKind,
    pub providers: Vec<ProviderStatus>,
    pub reranker_enabled: bool,
    pub sessions: usize,
}

// ============================================================================
// RagEngine
// ============================================================================

/// The main engine for ragent operations.
///
/// # Construction
///
/// Use [`RagEngine::from_config`] for typical usage, or
/// [`RagEngine::with_components`] to inject test doubles.
///
/// # Example
///
/// ```ignore
/// use ragent_core::{RagConfig, RagEngine, QueryRequest, Mode};
///
/// let engine = RagEngine::from_config(RagConfig::load_default()?).await?;
/// let response = engine
///     .process_query(QueryRequest::new("What is FAISS?").with_mode(Mode::Simple))
///     .await?;
/// println!("{}", response.answer);
/// ```
pub struct RagEngine {
    config: RagConfig,
    orchestrator: Arc<Orchestrator>,
}

impl RagEngine {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build the engine from configuration and load the persisted index.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an inference
    /// client cannot be constructed. A missing or corrupt index is not an
    /// error; the engine starts without one.
    pub async fn from_config(config: RagConfig) -> Result<Self, RagError> {
        config.validate()?;

        let components = EngineComponents {
            embedder: create_embedding_backend(&config)?,
            reranker: create_reranker_backend(&config)?,
            providers: create_provider_registry(&config),
            store: Some(IndexStore::new(config.resolved_index_dir())),
        };
        let engine = Self::with_components(config, components);
        engine.load_index().await;
        Ok(engine)
    }

    /// Build the engine from the default config location.
    pub async fn with_defaults() -> Result<Self, RagError> {
        Self::from_config(RagConfig::load_default()?).await
    }

    /// Build the engine from a specific config file.
    pub async fn with_config(path: &Path) -> Result<Self, RagError> {
        Self::from_config(RagConfig::from_path(path)?).await
    }

    /// Wire the pipeline from explicit collaborators. Does not load the index.
    pub fn with_components(config: RagConfig, components: EngineComponents) -> Self {
        let reranker = match components.reranker {
            Some(backend) if config.retrieval.reranker.enabled => Reranker::new(backend),
            _ => Reranker::disabled(),
        };
        let retriever = HybridRetriever::new(
            config.retrieval.hybrid.clone(),
            components.embedder,
            reranker,
            components.store,
        )
        .with_metric(config.embedding.metric);

        // Expansion runs on the default provider
        let expander = QueryExpander::new(
            config.expansion.clone(),
            components.providers.select(None).ok(),
        );

        let orchestrator = Orchestrator::new(
            Arc::new(retriever),
            expander,
            Arc::new(MemoryManager::new(&config.memory)),
            components.providers,
            config.retrieval.modes.clone(),
        )
        .with_strict_context(config.generation.strict_context);

        Self {
            config,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    // -------------------------------------------------------------------------
    // Answering
    // -------------------------------------------------------------------------

    /// Answer one question. See [`Orchestrator::process_query`].
    pub async fn process_query(&self, request: QueryRequest) -> Result<QueryResponse, RagError> {
        self.orchestrator.process_query(request).await
    }

    /// Stream a chat answer. See [`Orchestrator::stream_chat`].
    pub fn stream_chat(&self, request: ChatRequest) -> ChatStream {
        self.orchestrator.stream_chat(request)
    }

    // -------------------------------------------------------------------------
    // Index lifecycle
    // -------------------------------------------------------------------------

    /// Replace the index with one built from `passages`.
    pub async fn index_documents(&self, passages: Vec<Passage>) -> Result<IndexManifest, RagError> {
        self.orchestrator.retriever().index_documents(passages).await
    }

    /// Delete the index.
    pub async fn clear_index(&self) -> Result<(), RagError> {
        self.orchestrator.retriever().clear_index().await
    }

    /// Load the persisted index; `false` leaves the engine without one.
    pub async fn load_index(&self) -> bool {
        self.orchestrator.retriever().load_index().await
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.orchestrator.memory().get_raw_history(session_id)
    }

    /// History rendered as `User:` / `Assistant:` lines, empty if unknown.
    pub fn history_text(&self, session_id: &str) -> String {
        self.orchestrator.memory().get_history(session_id)
    }

    pub async fn clear_session(&self, session_id: &str) {
        self.orchestrator.memory().clear_history(session_id).await;
    }

    pub async fn clear_all_sessions(&self) {
        self.orchestrator.memory().clear_all().await;
    }

    pub fn list_sessions(&self) -> Vec<String> {
        self.orchestrator.memory().list_sessions()
    }

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------

    /// Report index state and probe every provider.
    ///
    /// Probes run concurrently, each bounded by `generation.probeTimeoutSecs`.
    pub async fn status(&self) -> EngineStatus {
        let timeout = Duration::from_secs(self.config.generation.probe_timeout_secs);
        let registry = self.orchestrator.providers();

        let probes = registry.providers().map(|provider| async move {
            let result = tokio::time::timeout(timeout, provider.health_check()).await;
            let error = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("no response within {}s", timeout.as_secs())),
            };
            debug!(
                "Probe '{}': {}",
                provider.kind(),
                error.as_deref().unwrap_or("ok")
            );
            ProviderStatus {
                provider: provider.kind(),
                model: provider.model_id().to_string(),
                reachable: error.is_none(),
                error,
            }
        });
        let providers = join_all(probes).await;

        let retriever = self.orchestrator.retriever();
        let status = EngineStatus {
            index_loaded: retriever.is_loaded(),
            passage_count: retriever.passage_count(),
            index_dir: retriever.store().map(|s| s.root().to_path_buf()),
            default_provider: registry.default_kind(),
            providers,
            reranker_enabled: retriever.reranker().is_enabled(),
            sessions: self.list_sessions().len(),
        };
        info!(
            "Status: index loaded={}, {} passages, {} providers",
            status.index_loaded,
            status.passage_count,
            status.providers.len()
        );
        status
    }
}

impl std::fmt::Debug for RagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine")
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}
