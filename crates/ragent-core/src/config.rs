//! Configuration types for ragent.
//!
//! Configuration is loaded from `~/.ragent/config.yaml` (or an explicit
//! path). A missing file yields defaults, so ragent works out of the box
//! against a local OpenAI-compatible server.
//!
//! # Example YAML
//!
//! ```yaml
//! retrieval:
//!   hybrid:
//!     useRrf: true
//!     rrfK: 60
//!     retrievalWidth: 50
//!   reranker:
//!     enabled: true
//!   modes:
//!     advancedPerQueryTopK: 10
//!     advancedFinalK: 5
//! expansion:
//!   enabled: true
//!   count: 3
//! memory:
//!   historyLimit: 5
//!   persistPath: /home/me/.ragent/history.json
//! generation:
//!   defaultProvider: groq
//!   strictContext: false
//! providers:
//!   local:
//!     baseUrl: http://localhost:11434/v1
//!     model: llama3.2
//! indexDir: /home/me/.ragent/index
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ragent_db::vector::VectorMetric;
use ragent_model::{ChatConfig, DEFAULT_LOCAL_BASE_URL, DEFAULT_RERANKER_MODEL_ID};

use crate::bm25::HybridSearchConfig;
use crate::errors::RagError;
use crate::generation::ProviderKind;
use crate::memory::MemoryConfig;
use crate::query_expansion::ExpansionConfig;

/// Directory under the home directory holding config, index and history.
pub const RAGENT_HOME_DIR: &str = ".ragent";

/// Config file name inside [`RAGENT_HOME_DIR`].
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Index directory name inside [`RAGENT_HOME_DIR`].
pub const INDEX_DIR_NAME: &str = "index";

// ============================================================================
// RagConfig
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub expansion: ExpansionConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Embedding endpoint and index metric.
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Cross-encoder endpoint.
    #[serde(default)]
    pub reranking: ragent_model::RerankerConfig,

    /// Where the index lives. Defaults to `~/.ragent/index`.
    #[serde(default)]
    pub index_dir: Option<PathBuf>,
}

impl RagConfig {
    /// Load from `~/.ragent/config.yaml`, or defaults if there is no home
    /// directory or no file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the file exists but cannot be parsed.
    pub fn load_default() -> Result<Self, RagError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific path. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the file cannot be read or parsed,
    /// and [`RagError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, RagError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            RagError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            RagError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let warnings = config.validate()?;
        for warning in warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Load from `path` if given, else from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self, RagError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::load_default(),
        }
    }

    /// `~/.ragent`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(RAGENT_HOME_DIR))
    }

    /// `~/.ragent/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(CONFIG_FILENAME))
    }

    /// Index directory, falling back to `~/.ragent/index` (or a relative
    /// `.ragent/index` without a home directory).
    pub fn resolved_index_dir(&self) -> PathBuf {
        self.index_dir.clone().unwrap_or_else(|| {
            Self::default_dir()
                .unwrap_or_else(|| PathBuf::from(RAGENT_HOME_DIR))
                .join(INDEX_DIR_NAME)
        })
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first fatal problem as [`RagError::InvalidConfiguration`].
    ///
    /// # Warnings
    ///
    /// Non-fatal issues are returned for the caller to log.
    pub fn validate(&self) -> Result<Vec<String>, RagError> {
        let mut warnings = Vec::new();
        warnings.extend(self.retrieval.hybrid.validate()?);
        warnings.extend(self.retrieval.modes.validate()?);
        warnings.extend(self.expansion.validate()?);
        warnings.extend(self.memory.validate()?);
        warnings.extend(self.generation.validate()?);
        Ok(warnings)
    }
}

// ============================================================================
// RetrievalConfig
// ============================================================================

/// Retrieval configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Hybrid search (dense + BM25) settings.
    #[serde(default)]
    pub hybrid: HybridSearchConfig,

    #[serde(default)]
    pub reranker: RerankerSettings,

    /// Per-mode retrieval depths.
    #[serde(default)]
    pub modes: ModesConfig,
}

/// Cross-encoder reranking switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankerSettings {
    /// Whether retrieval reranks its candidates.
    #[serde(default = "default_reranker_enabled")]
    pub enabled: bool,

    /// Cross-encoder model identifier.
    #[serde(default = "default_reranker_model_id")]
    pub model_id: String,
}

fn default_reranker_enabled() -> bool {
    true
}

fn default_reranker_model_id() -> String {
    DEFAULT_RERANKER_MODEL_ID.to_string()
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            enabled: default_reranker_enabled(),
            model_id: default_reranker_model_id(),
        }
    }
}

/// Retrieval depth for each pipeline mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModesConfig {
    #[serde(default = "default_fast_top_k")]
    pub fast_top_k: usize,

    #[serde(default = "default_simple_top_k")]
    pub simple_top_k: usize,

    /// Passages kept per expanded query before the final rerank.
    #[serde(default = "default_advanced_per_query_top_k")]
    pub advanced_per_query_top_k: usize,

    /// Passages kept after the final rerank.
    #[serde(default = "default_advanced_final_k")]
    pub advanced_final_k: usize,
}

fn default_fast_top_k() -> usize {
    1
}

fn default_simple_top_k() -> usize {
    3
}

fn default_advanced_per_query_top_k() -> usize {
    10
}

fn default_advanced_final_k() -> usize {
    5
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            fast_top_k: default_fast_top_k(),
            simple_top_k: default_simple_top_k(),
            advanced_per_query_top_k: default_advanced_per_query_top_k(),
            advanced_final_k: default_advanced_final_k(),
        }
    }
}

impl ModesConfig {
    pub fn validate(&self) -> Result<Vec<String>, RagError> {
        for (key, value) in [
            ("fastTopK", self.fast_top_k),
            ("simpleTopK", self.simple_top_k),
            ("advancedPerQueryTopK", self.advanced_per_query_top_k),
            ("advancedFinalK", self.advanced_final_k),
        ] {
            if value == 0 {
                return Err(RagError::InvalidConfiguration {
                    message: format!("retrieval.modes.{key} cannot be 0"),
                    hint: format!("Set {key} to at least 1"),
                });
            }
        }

        let mut warnings = Vec::new();
        if self.fast_top_k > self.simple_top_k {
            warnings.push(format!(
                "retrieval.modes.fastTopK ({}) exceeds simpleTopK ({}); fast mode will retrieve more than simple",
                self.fast_top_k, self.simple_top_k
            ));
        }
        if self.advanced_final_k > self.advanced_per_query_top_k {
            warnings.push(format!(
                "retrieval.modes.advancedFinalK ({}) exceeds advancedPerQueryTopK ({})",
                self.advanced_final_k, self.advanced_per_query_top_k
            ));
        }
        Ok(warnings)
    }
}

// ============================================================================
// GenerationConfig
// ============================================================================

/// Generation settings shared by every provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Provider used when a request names none, or an unknown one.
    #[serde(default = "default_provider_name")]
    pub default_provider: String,

    /// Answer strictly from context instead of falling back to general
    /// knowledge.
    #[serde(default)]
    pub strict_context: bool,

    /// Timeout for provider reachability probes.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Timeout for generation requests. Unbounded when unset.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_provider_name() -> String {
    ProviderKind::DEFAULT.as_str().to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider_name(),
            strict_context: false,
            probe_timeout_secs: default_probe_timeout_secs(),
            request_timeout_secs: None,
        }
    }
}

impl GenerationConfig {
    /// Configured default backend; unknown names resolve to groq.
    pub fn default_kind(&self) -> ProviderKind {
        ProviderKind::parse(&self.default_provider).unwrap_or(ProviderKind::DEFAULT)
    }

    pub fn validate(&self) -> Result<Vec<String>, RagError> {
        if self.probe_timeout_secs == 0 {
            return Err(RagError::InvalidConfiguration {
                message: "generation.probeTimeoutSecs cannot be 0".to_string(),
                hint: "Set probeTimeoutSecs to a few seconds (recommended: 5)".to_string(),
            });
        }

        let mut warnings = Vec::new();
        if ProviderKind::parse(&self.default_provider).is_none() {
            warnings.push(format!(
                "generation.defaultProvider '{}' is unknown; using '{}'",
                self.default_provider,
                ProviderKind::DEFAULT
            ));
        }
        Ok(warnings)
    }
}

// ============================================================================
// ProvidersConfig
// ============================================================================

/// Per-provider endpoint overrides. Unset fields use the provider defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default = "default_provider_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub base_url: Option<String>,

    /// API key; falls back to the provider's environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

fn default_provider_enabled() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: default_provider_enabled(),
            base_url: None,
            api_key: None,
            model: None,
        }
    }
}

/// All generation backends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersConfig {
    #[serde(default)]
    pub groq: ProviderConfig,

    #[serde(default)]
    pub openai: ProviderConfig,

    #[serde(default)]
    pub gemini: ProviderConfig,

    #[serde(default)]
    pub local: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::Groq => &self.groq,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Local => &self.local,
        }
    }

    /// Resolve the chat endpoint for `kind`.
    ///
    /// Returns `None` when the provider is disabled or needs an API key that
    /// is neither configured nor in the environment.
    pub fn chat_config(&self, kind: ProviderKind, timeout_secs: Option<u64>) -> Option<ChatConfig> {
        let provider = self.get(kind);
        if !provider.enabled {
            return None;
        }

        let api_key = provider
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| {
                kind.api_key_env()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.is_empty())
            });
        if kind.api_key_env().is_some() && api_key.is_none() {
            return None;
        }

        let (base_url, model) = provider_defaults(kind);
        let base_url = provider.base_url.clone().unwrap_or_else(|| base_url.to_string());
        let model = provider.model.clone().unwrap_or_else(|| model.to_string());

        let config = match kind {
            ProviderKind::Gemini => ChatConfig::gemini(base_url, model),
            _ => ChatConfig::openai_compatible(base_url, model),
        };
        Some(ChatConfig {
            timeout_secs,
            ..config.with_api_key(api_key)
        })
    }
}

/// Default (base URL, model) for each backend.
pub fn provider_defaults(kind: ProviderKind) -> (&'static str, &'static str) {
    match kind {
        ProviderKind::Groq => ("https://api.groq.com/openai/v1", "llama-3.1-8b-instant"),
        ProviderKind::OpenAi => ("https://api.openai.com/v1", "gpt-4o-mini"),
        ProviderKind::Gemini => (
            "https://generativelanguage.googleapis.com/v1beta",
            "gemini-1.5-flash",
        ),
        ProviderKind::Local => (DEFAULT_LOCAL_BASE_URL, "local-model"),
    }
}

// ============================================================================
// EmbeddingSettings
// ============================================================================

/// Embedding endpoint plus the metric the dense index scores with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    #[serde(flatten)]
    pub endpoint: ragent_model::EmbeddingConfig,

    #[serde(default)]
    pub metric: VectorMetric,
}
