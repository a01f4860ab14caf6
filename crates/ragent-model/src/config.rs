//! Configuration types for ragent-model.
//!
//! These are the canonical endpoint settings for every remote model ragent
//! talks to. `ragent-core` embeds them directly in its YAML config rather than
//! defining parallel types.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_EMBEDDING_MODEL_ID, DEFAULT_RERANKER_MODEL_ID};

/// Default base URL for OpenAI-compatible local servers (Ollama, LM Studio).
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:11434/v1";

/// Default base URL for a text-embeddings-inference rerank server.
pub const DEFAULT_RERANKER_BASE_URL: &str = "http://localhost:8080";

// ============================================================================
// ChatApiKind
// ============================================================================

/// Wire protocol spoken by a chat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatApiKind {
    /// `POST {base}/chat/completions` (OpenAI, Groq, Ollama, LM Studio).
    #[default]
    OpenAiCompatible,
    /// `POST {base}/models/{model}:generateContent` (Google Gemini).
    Gemini,
}

impl std::fmt::Display for ChatApiKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAiCompatible => write!(f, "openai-compatible"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

// ============================================================================
// ChatConfig
// ============================================================================

/// Settings for one chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Wire protocol.
    #[serde(default)]
    pub api: ChatApiKind,

    /// Base URL, without a trailing slash.
    #[serde(default = "default_local_base_url")]
    pub base_url: String,

    /// API key. Sent as a bearer token (OpenAI-compatible) or `key` query
    /// parameter (Gemini).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name sent with each request unless overridden per call.
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds. `None` leaves generation unbounded since
    /// answer length is not known up front.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_local_base_url() -> String {
    DEFAULT_LOCAL_BASE_URL.to_string()
}

fn default_chat_model() -> String {
    "local-model".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api: ChatApiKind::default(),
            base_url: default_local_base_url(),
            api_key: None,
            model: default_chat_model(),
            temperature: default_temperature(),
            timeout_secs: None,
        }
    }
}

impl ChatConfig {
    /// OpenAI-compatible endpoint at `base_url` serving `model`.
    pub fn openai_compatible(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Gemini endpoint at `base_url` serving `model`.
    pub fn gemini(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api: ChatApiKind::Gemini,
            base_url: base_url.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

// ============================================================================
// EmbeddingConfig
// ============================================================================

/// Settings for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Base URL, without a trailing slash.
    #[serde(default = "default_local_base_url")]
    pub base_url: String,

    /// Optional API key (bearer token).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Maximum texts per request.
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL_ID.to_string()
}

fn default_embedding_batch_size() -> usize {
    32
}

fn default_embedding_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_base_url(),
            api_key: None,
            model: default_embedding_model(),
            batch_size: default_embedding_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

// ============================================================================
// RerankerConfig
// ============================================================================

/// Settings for a cross-encoder `/rerank` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankerConfig {
    /// Base URL, without a trailing slash.
    #[serde(default = "default_reranker_base_url")]
    pub base_url: String,

    /// Cross-encoder model identifier (informational for TEI servers).
    #[serde(default = "default_reranker_model_id")]
    pub model_id: String,

    /// Request timeout in seconds.
    #[serde(default = "default_reranker_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_reranker_base_url() -> String {
    DEFAULT_RERANKER_BASE_URL.to_string()
}

fn default_reranker_model_id() -> String {
    DEFAULT_RERANKER_MODEL_ID.to_string()
}

fn default_reranker_timeout_secs() -> u64 {
    30
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: default_reranker_base_url(),
            model_id: default_reranker_model_id(),
            timeout_secs: default_reranker_timeout_secs(),
        }
    }
}
