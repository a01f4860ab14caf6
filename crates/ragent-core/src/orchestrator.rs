//! Mode-driven RAG pipeline.
//!
//! Two entry points share one retrieval strategy per [`Mode`]:
//!
//! - [`Orchestrator::process_query`]: question + optional session id in, a
//!   complete answer with citations out. The turn is written to memory.
//! - [`Orchestrator::stream_chat`]: a message list in, a [`ChatStream`] of
//!   [`StreamEvent`]s out. Status events come first, then answer text, then
//!   (only if passages were used and nothing failed) one citations event.
//!
//! | Mode     | Queries          | Per-query depth | Rerank |
//! |----------|------------------|-----------------|--------|
//! | fast     | original only    | `fastTopK`      | no     |
//! | simple   | original only    | `simpleTopK`    | no     |
//! | advanced | expanded + orig. | `advancedPerQueryTopK` | yes, to `advancedFinalK` |

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ModesConfig;
use crate::errors::RagError;
use crate::generation::{GenerationProvider, GenerationRequest, ProviderKind, ProviderRegistry};
use crate::memory::MemoryManager;
use crate::prompt::{build_context, contextualize_prompt, format_chat_history, instruction};
use crate::query_expansion::QueryExpander;
use crate::retriever::{HybridRetriever, RetrievalRequest};
use crate::types::{dedup_by_content, Citation, Message, Passage};

/// Events buffered between the pipeline task and a slow consumer.
const STREAM_BUFFER: usize = 32;

// ============================================================================
// Mode
// ============================================================================

/// Quality/latency trade-off for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Fast,
    #[default]
    Simple,
    Advanced,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Self::Fast, Self::Simple, Self::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Simple => "simple",
            Self::Advanced => "advanced",
        }
    }

    /// Parse a mode name, falling back to [`Mode::Simple`] for anything
    /// unrecognized.
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown mode '{}', using '{}'", name, Self::default());
            Self::default()
        })
    }

    /// Retrieval plan for this mode.
    pub fn plan(&self, modes: &ModesConfig) -> ModePlan {
        match self {
            Self::Fast => ModePlan {
                expand: false,
                per_query_top_k: modes.fast_top_k,
                final_k: modes.fast_top_k,
                rerank: false,
            },
            Self::Simple => ModePlan {
                expand: false,
                per_query_top_k: modes.simple_top_k,
                final_k: modes.simple_top_k,
                rerank: false,
            },
            Self::Advanced => ModePlan {
                expand: true,
                per_query_top_k: modes.advanced_per_query_top_k,
                final_k: modes.advanced_final_k,
                rerank: true,
            },
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "simple" => Ok(Self::Simple),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// How a mode retrieves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePlan {
    /// Expand the query before retrieving.
    pub expand: bool,
    /// Passages retrieved per query.
    pub per_query_top_k: usize,
    /// Passages kept in the end.
    pub final_k: usize,
    /// Rerank the union against the original query.
    pub rerank: bool,
}

// ============================================================================
// Requests and responses
// ============================================================================

/// A single-question request.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub query: String,
    /// Conversation to read history from and append the turn to.
    pub session_id: Option<String>,
    pub mode: Mode,
    /// Requested provider name; unknown names use the default.
    pub provider: Option<String>,
    /// Overrides the provider's configured model.
    pub model: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Answer to a [`QueryRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub answer: String,
    /// One per passage in the answer context, in context order.
    pub citations: Vec<Citation>,
    pub provider_used: ProviderKind,
    pub model: String,
    pub latency_ms: u64,
}

impl QueryResponse {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// A chat request over a message list; the last message is the live query.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub mode: Mode,
    /// Retrieve context; without it the model answers from history alone.
    pub use_rag: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            mode: Mode::default(),
            use_rag: true,
            provider: None,
            model: None,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rag(mut self, use_rag: bool) -> Self {
        self.use_rag = use_rag;
        self
    }

    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

// ============================================================================
// Streaming events
// ============================================================================

/// Pipeline stage reported by status events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Contextualizing,
    Searching,
    Expanding,
    Reranking,
    Generating,
}

impl PipelineStage {
    /// Human-readable progress line.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Contextualizing => "Contextualizing question...",
            Self::Searching => "Searching knowledge base...",
            Self::Expanding => "Expanding query...",
            Self::Reranking => "Reranking results...",
            Self::Generating => "Generating answer...",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One item of a chat stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StreamEvent {
    Status(PipelineStage),
    Text(String),
    /// Always the last event when present.
    Citations(Vec<Citation>),
    /// Terminal; no citations follow.
    Error(String),
}

/// Consumer side of a streaming chat.
///
/// Dropping the stream cancels the pipeline task.
pub struct ChatStream {
    events: mpsc::Receiver<StreamEvent>,
    task: JoinHandle<()>,
    cancelled: bool,
}

impl ChatStream {
    /// Stop the pipeline. Events already queued are discarded, so nothing
    /// is yielded after this call.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.task.abort();
        self.events.close();
        while self.events.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Stream for ChatStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancelled {
            return Poll::Ready(None);
        }
        self.events.poll_recv(cx)
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatStream")
            .field("finished", &self.task.is_finished())
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Combines expansion, retrieval, memory and generation per [`Mode`].
pub struct Orchestrator {
    retriever: Arc<HybridRetriever>,
    expander: QueryExpander,
    memory: Arc<MemoryManager>,
    providers: ProviderRegistry,
    modes: ModesConfig,
    strict_context: bool,
}

impl Orchestrator {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        expander: QueryExpander,
        memory: Arc<MemoryManager>,
        providers: ProviderRegistry,
        modes: ModesConfig,
    ) -> Self {
        Self {
            retriever,
            expander,
            memory,
            providers,
            modes,
            strict_context: false,
        }
    }

    /// Answer strictly from context instead of allowing general knowledge.
    pub fn with_strict_context(mut self, strict: bool) -> Self {
        self.strict_context = strict;
        self
    }

    pub fn retriever(&self) -> &Arc<HybridRetriever> {
        &self.retriever
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn modes(&self) -> &ModesConfig {
        &self.modes
    }

    // ------------------------------------------------------------------------
    // Retrieval per mode
    // ------------------------------------------------------------------------

    /// Retrieve the final passage set for `query` under `mode`.
    ///
    /// Never fails: retrieval and expansion problems degrade to fewer or no
    /// passages.
    pub async fn retrieve_for_mode(&self, query: &str, mode: Mode) -> Vec<Passage> {
        self.retrieve_reporting(query, mode, None).await
    }

    async fn retrieve_reporting(
        &self,
        query: &str,
        mode: Mode,
        events: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Vec<Passage> {
        let plan = mode.plan(&self.modes);
        let start = Instant::now();

        if !plan.expand {
            let request = RetrievalRequest::new(query, plan.final_k).with_rerank(plan.rerank);
            let passages = self.retriever.retrieve_with(request).await;
            debug!(
                "{} retrieval: {} passages in {:?}",
                mode,
                passages.len(),
                start.elapsed()
            );
            return passages;
        }

        if self.expander.is_active() {
            report(events, PipelineStage::Expanding).await;
        }
        let queries = self.expander.generate_queries(query).await;
        debug!("Retrieving for {} queries", queries.len());

        // join_all keeps query order, so the union below is deterministic
        let per_query = join_all(queries.iter().map(|q| {
            self.retriever
                .retrieve_with(RetrievalRequest::new(q.as_str(), plan.per_query_top_k).with_rerank(false))
        }))
        .await;
        let union = dedup_by_content(per_query.into_iter().flatten());
        let candidates = union.len();

        let passages = if plan.rerank && !union.is_empty() {
            report(events, PipelineStage::Reranking).await;
            self.retriever
                .reranker()
                .rerank(query, union, plan.final_k)
                .await
        } else {
            union.into_iter().take(plan.final_k).collect()
        };

        debug!(
            "{} retrieval: {} queries, {} candidates, {} passages in {:?}",
            mode,
            queries.len(),
            candidates,
            passages.len(),
            start.elapsed()
        );
        passages
    }

    // ------------------------------------------------------------------------
    // Full-answer path
    // ------------------------------------------------------------------------

    /// Answer one question.
    ///
    /// # Errors
    ///
    /// Only generation failures (or having no provider at all) fail the
    /// request; retrieval always degrades instead.
    pub async fn process_query(&self, request: QueryRequest) -> Result<QueryResponse, RagError> {
        let start = Instant::now();
        let session_id = request.session_id.as_deref().filter(|s| !s.is_empty());

        let history = session_id
            .map(|id| self.memory.get_history(id))
            .unwrap_or_default();
        let passages = self.retrieve_for_mode(&request.query, request.mode).await;
        let context = build_context(&history, &passages);

        let provider = self.providers.select(request.provider.as_deref())?;
        let generation = GenerationRequest::grounded(
            request.query.as_str(),
            context,
            instruction(self.strict_context),
        )
        .with_model(request.model.clone());

        let answer = provider.generate(&generation).await.map_err(|e| {
            error!("Generation with '{}' failed: {}", provider.kind(), e);
            e
        })?;

        if let Some(id) = session_id {
            self.memory.add_turn(id, &request.query, &answer).await;
        }

        let latency = start.elapsed();
        info!(
            "Answered in {:?} ({} mode, {} passages, provider '{}')",
            latency,
            request.mode,
            passages.len(),
            provider.kind()
        );

        Ok(QueryResponse {
            answer,
            citations: passages.iter().map(Citation::from).collect(),
            provider_used: provider.kind(),
            model: request
                .model
                .unwrap_or_else(|| provider.model_id().to_string()),
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        })
    }

    // ------------------------------------------------------------------------
    // Streaming path
    // ------------------------------------------------------------------------

    /// Run the chat pipeline on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream_chat(self: &Arc<Self>, request: ChatRequest) -> ChatStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            if let Err(e) = this.run_chat(request, &tx).await {
                match e {
                    RagError::Cancelled => debug!("Chat stream cancelled by consumer"),
                    other => {
                        error!("Chat stream failed: {}", other);
                        let _ = tx.send(StreamEvent::Error(other.to_string())).await;
                    }
                }
            }
        });
        ChatStream {
            events: rx,
            task,
            cancelled: false,
        }
    }

    async fn run_chat(
        &self,
        request: ChatRequest,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), RagError> {
        let Some((last, prior)) = request.messages.split_last() else {
            return Err(RagError::InvalidRequest(
                "chat request has no messages".to_string(),
            ));
        };
        let question = last.content.as_str();
        let history = format_chat_history(prior);
        let provider = self.providers.select(request.provider.as_deref())?;

        let passages = if request.use_rag {
            let search_query = if prior.is_empty() {
                question.to_string()
            } else {
                send(tx, StreamEvent::Status(PipelineStage::Contextualizing)).await?;
                self.contextualize(provider.as_ref(), &history, question, request.model.clone())
                    .await
            };

            send(tx, StreamEvent::Status(PipelineStage::Searching)).await?;
            self.retrieve_reporting(&search_query, request.mode, Some(tx))
                .await
        } else {
            Vec::new()
        };

        send(tx, StreamEvent::Status(PipelineStage::Generating)).await?;
        let generation = GenerationRequest::grounded(
            question,
            build_context(&history, &passages),
            instruction(self.strict_context),
        )
        .with_model(request.model);

        let mut fragments = provider.stream_generate(&generation).await?;
        while let Some(fragment) = fragments.next().await {
            if tx.is_closed() {
                return Err(RagError::Cancelled);
            }
            send(tx, StreamEvent::Text(fragment?)).await?;
        }

        if !passages.is_empty() {
            let citations = passages.iter().map(Citation::from).collect();
            send(tx, StreamEvent::Citations(citations)).await?;
        }
        Ok(())
    }

    /// Rewrite a follow-up into a standalone search query.
    async fn contextualize(
        &self,
        provider: &dyn GenerationProvider,
        history: &str,
        question: &str,
        model: Option<String>,
    ) -> String {
        let request = GenerationRequest::raw(contextualize_prompt(history, question)).with_model(model);
        match provider.generate(&request).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => {
                let rewritten = rewritten.trim().to_string();
                debug!("Contextualized '{}' as '{}'", question, rewritten);
                rewritten
            }
            Ok(_) => question.to_string(),
            Err(e) => {
                warn!("Query contextualization failed, using raw question: {}", e);
                question.to_string()
            }
        }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("retriever", &self.retriever)
            .field("expander", &self.expander)
            .field("providers", &self.providers)
            .field("modes", &self.modes)
            .field("strict_context", &self.strict_context)
            .finish()
    }
}

async fn send(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<(), RagError> {
    tx.send(event).await.map_err(|_| RagError::Cancelled)
}

async fn report(events: Option<&mpsc::Sender<StreamEvent>>, stage: PipelineStage) {
    if let Some(tx) = events {
        let _ = tx.send(StreamEvent::Status(stage)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("fast".parse::<Mode>().unwrap(), Mode::Fast);
        assert_eq!(" Advanced ".parse::<Mode>().unwrap(), Mode::Advanced);
        assert!("turbo".parse::<Mode>().is_err());
        assert_eq!(Mode::resolve("turbo"), Mode::Simple);
        assert_eq!(Mode::resolve("fast"), Mode::Fast);
    }

    #[test]
    fn test_mode_plans_follow_config() {
        let modes = ModesConfig::default();
        let fast = Mode::Fast.plan(&modes);
        assert_eq!((fast.per_query_top_k, fast.rerank, fast.expand), (1, false, false));

        let simple = Mode::Simple.plan(&modes);
        assert_eq!((simple.final_k, simple.rerank), (3, false));

        let advanced = Mode::Advanced.plan(&modes);
        assert!(advanced.expand && advanced.rerank);
        assert_eq!((advanced.per_query_top_k, advanced.final_k), (10, 5));
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(PipelineStage::Searching.label(), "Searching knowledge base...");
        assert_eq!(PipelineStage::Generating.to_string(), "Generating answer...");
    }

    #[test]
    fn test_stream_event_serialization() {
        let json = serde_json::to_string(&StreamEvent::Status(PipelineStage::Reranking)).unwrap();
        assert_eq!(json, r#"{"type":"status","data":"reranking"}"#);

        let json = serde_json::to_string(&StreamEvent::Text("hi".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"text","data":"hi"}"#);
    }

    #[test]
    fn test_query_response_latency() {
        let response = QueryResponse {
            answer: String::new(),
            citations: Vec::new(),
            provider_used: ProviderKind::Local,
            model: "m".to_string(),
            latency_ms: 1500,
        };
        assert_eq!(response.latency(), Duration::from_millis(1500));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["providerUsed"], "local");
        assert_eq!(json["latencyMs"], 1500);
    }
}
