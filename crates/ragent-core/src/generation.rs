//! Generation provider abstraction.
//!
//! A closed set of backends ([`ProviderKind`]) behind one capability trait
//! ([`GenerationProvider`]). [`ProviderRegistry::select`] maps a requested
//! name to a backend and never fails on an unknown name: it falls back to
//! the configured default.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::RagError;
use crate::prompt::build_prompt;

/// Lazily produced answer fragments. Finite and not restartable.
pub type TextStream = BoxStream<'static, Result<String, RagError>>;

// ============================================================================
// ProviderKind
// ============================================================================

/// Supported generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Groq,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    Local,
}

impl ProviderKind {
    /// Every supported backend.
    pub const ALL: [ProviderKind; 4] = [Self::Groq, Self::OpenAi, Self::Gemini, Self::Local];

    /// Backend used when nothing else is configured.
    pub const DEFAULT: ProviderKind = Self::Groq;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Local => "local",
        }
    }

    /// Environment variable holding the API key, if the backend needs one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("GROQ_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Local => None,
        }
    }

    /// Parse a provider name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "groq" => Some(Self::Groq),
            "openai" | "open-ai" => Some(Self::OpenAi),
            "gemini" | "google" => Some(Self::Gemini),
            "local" | "ollama" => Some(Self::Local),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown provider '{}'", s))
    }
}

// ============================================================================
// GenerationRequest
// ============================================================================

/// One generation call.
///
/// Grounded requests carry an instruction and are rendered with
/// [`build_prompt`]; raw requests (query expansion, rewriting) send the
/// question verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub question: String,
    /// Assembled context; empty means none.
    pub context: String,
    pub instruction: Option<String>,
    /// Overrides the provider's configured model.
    pub model: Option<String>,
}

impl GenerationRequest {
    /// A request answered from `context` under `instruction`.
    pub fn grounded(
        question: impl Into<String>,
        context: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            context: context.into(),
            instruction: Some(instruction.into()),
            model: None,
        }
    }

    /// A request sent as-is, without instruction or context.
    pub fn raw(prompt: impl Into<String>) -> Self {
        Self {
            question: prompt.into(),
            context: String::new(),
            instruction: None,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// The text sent to the backend.
    pub fn to_prompt(&self) -> String {
        match &self.instruction {
            Some(instruction) => build_prompt(instruction, &self.context, &self.question),
            None => self.question.clone(),
        }
    }
}

// ============================================================================
// GenerationProvider Trait
// ============================================================================

/// Capability interface every generation backend implements.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ProviderKind;

    /// Configured model name.
    fn model_id(&self) -> &str;

    /// Produce a complete answer.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, RagError>;

    /// Produce an answer incrementally.
    async fn stream_generate(&self, request: &GenerationRequest) -> Result<TextStream, RagError>;

    /// Cheap reachability probe.
    async fn health_check(&self) -> Result<(), RagError>;
}

// ============================================================================
// ProviderRegistry
// ============================================================================

/// The generation backends available to the orchestrator.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderKind, Arc<dyn GenerationProvider>>,
    default: ProviderKind,
}

impl ProviderRegistry {
    /// Empty registry whose fallback is `default`.
    pub fn new(default: ProviderKind) -> Self {
        Self {
            providers: BTreeMap::new(),
            default,
        }
    }

    /// Register a backend, replacing any previous one of the same kind.
    pub fn register(&mut self, provider: Arc<dyn GenerationProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn default_kind(&self) -> ProviderKind {
        self.default
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn GenerationProvider>> {
        self.providers.get(&kind)
    }

    /// Registered backends in a stable order.
    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn GenerationProvider>> {
        self.providers.values()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Map a requested provider name to a backend.
    ///
    /// Unknown or unregistered names fall back to the default backend.
    ///
    /// # Errors
    ///
    /// [`RagError::NoProvider`] only when the default itself is not
    /// registered.
    pub fn select(&self, requested: Option<&str>) -> Result<Arc<dyn GenerationProvider>, RagError> {
        let kind = match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => ProviderKind::parse(name).unwrap_or_else(|| {
                warn!(
                    "Unknown provider '{}', falling back to '{}'",
                    name, self.default
                );
                self.default
            }),
            None => self.default,
        };

        if let Some(provider) = self.providers.get(&kind) {
            debug!("Selected provider '{}'", kind);
            return Ok(Arc::clone(provider));
        }

        if kind != self.default {
            warn!(
                "Provider '{}' is not configured, falling back to '{}'",
                kind, self.default
            );
        }
        self.providers
            .get(&self.default)
            .cloned()
            .ok_or_else(|| {
                RagError::NoProvider(format!(
                    "default provider '{}' is not configured",
                    self.default
                ))
            })
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("default", &self.default)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    struct FixedProvider {
        kind: ProviderKind,
    }

    #[async_trait]
    impl GenerationProvider for FixedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn model_id(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<String, RagError> {
            Ok(self.kind.to_string())
        }

        async fn stream_generate(&self, _request: &GenerationRequest) -> Result<TextStream, RagError> {
            Ok(Box::pin(stream::iter(vec![Ok(self.kind.to_string())])))
        }

        async fn health_check(&self) -> Result<(), RagError> {
            Ok(())
        }
    }

    fn registry(default: ProviderKind, kinds: &[ProviderKind]) -> ProviderRegistry {
        kinds.iter().fold(ProviderRegistry::new(default), |r, kind| {
            r.with_provider(Arc::new(FixedProvider { kind: *kind }))
        })
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("GROQ"), Some(ProviderKind::Groq));
        assert_eq!(ProviderKind::parse(" openai "), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("ollama"), Some(ProviderKind::Local));
        assert_eq!(ProviderKind::parse("claude"), None);
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_serde_names() {
        let json = serde_json::to_string(&ProviderKind::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        for kind in ProviderKind::ALL {
            let back: ProviderKind =
                serde_json::from_str(&format!("\"{}\"", kind.as_str())).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn test_select_known_provider() {
        let registry = registry(ProviderKind::Groq, &ProviderKind::ALL);
        let provider = registry.select(Some("gemini")).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Gemini);
    }

    #[test]
    fn test_select_unknown_falls_back_to_default() {
        let registry = registry(ProviderKind::Groq, &ProviderKind::ALL);
        for name in ["mystery", "", "  "] {
            assert_eq!(registry.select(Some(name)).unwrap().kind(), ProviderKind::Groq);
        }
        assert_eq!(registry.select(None).unwrap().kind(), ProviderKind::Groq);
    }

    #[test]
    fn test_select_unregistered_falls_back_to_default() {
        let registry = registry(ProviderKind::Local, &[ProviderKind::Local]);
        assert_eq!(
            registry.select(Some("openai")).unwrap().kind(),
            ProviderKind::Local
        );
    }

    #[test]
    fn test_select_without_default_is_error() {
        let registry = registry(ProviderKind::Groq, &[ProviderKind::Local]);
        assert!(matches!(
            registry.select(Some("unknown")),
            Err(RagError::NoProvider(_))
        ));
        // An explicitly requested registered backend still works
        assert_eq!(
            registry.select(Some("local")).unwrap().kind(),
            ProviderKind::Local
        );
    }

    #[test]
    fn test_request_rendering() {
        let grounded = GenerationRequest::grounded("Q?", "ctx", "Inst.");
        assert_eq!(grounded.to_prompt(), "Inst.\n\nContext: ctx\n\nQuestion: Q?");

        let raw = GenerationRequest::raw("just this");
        assert_eq!(raw.to_prompt(), "just this");
    }
}
