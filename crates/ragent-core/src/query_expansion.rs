//! LLM-backed multi-query expansion.
//!
//! Abstract questions often miss passages phrased differently. The expander
//! asks a generation backend for `C` alternate search queries and returns
//! them together with the original, which is always present.
//!
//! Expansion never blocks retrieval: when disabled, when the backend fails,
//! or when it returns nothing usable, the result is just `[original]`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::RagError;
use crate::generation::{GenerationProvider, GenerationRequest};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for query expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionConfig {
    /// Whether to ask the model for alternate queries.
    #[serde(default = "default_expansion_enabled")]
    pub enabled: bool,

    /// Number of alternate queries to request (C).
    #[serde(default = "default_expansion_count")]
    pub count: usize,
}

fn default_expansion_enabled() -> bool {
    true
}

fn default_expansion_count() -> usize {
    3
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: default_expansion_enabled(),
            count: default_expansion_count(),
        }
    }
}

impl ExpansionConfig {
    pub fn validate(&self) -> Result<Vec<String>, RagError> {
        let mut warnings = Vec::new();
        if self.enabled && self.count == 0 {
            warnings.push(
                "expansion.count is 0; advanced mode will only search the original query"
                    .to_string(),
            );
        }
        if self.count > 10 {
            warnings.push(format!(
                "expansion.count ({}) is large; advanced mode runs one retrieval per query",
                self.count
            ));
        }
        Ok(warnings)
    }
}

// ============================================================================
// QueryExpander
// ============================================================================

/// Generates alternate search queries with a language model.
#[derive(Clone)]
pub struct QueryExpander {
    config: ExpansionConfig,
    provider: Option<Arc<dyn GenerationProvider>>,
}

impl QueryExpander {
    pub fn new(config: ExpansionConfig, provider: Option<Arc<dyn GenerationProvider>>) -> Self {
        Self { config, provider }
    }

    /// Expander that always returns the original query.
    pub fn disabled() -> Self {
        Self {
            config: ExpansionConfig {
                enabled: false,
                ..Default::default()
            },
            provider: None,
        }
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Whether `generate_queries` will call the backend at all.
    pub fn is_active(&self) -> bool {
        self.provider.is_some() && self.config.enabled && self.config.count > 0
    }

    /// Produce up to `C + 1` queries, the original always among them.
    pub async fn generate_queries(&self, original: &str) -> Vec<String> {
        match self.expand(original).await {
            Ok(queries) => queries,
            Err(e) => {
                warn!("{}, using the original query", e);
                vec![original.to_string()]
            }
        }
    }

    async fn expand(&self, original: &str) -> Result<Vec<String>, RagError> {
        let provider = match &self.provider {
            Some(provider) if self.is_active() => provider,
            _ => return Ok(vec![original.to_string()]),
        };

        let request = GenerationRequest::raw(expansion_prompt(original, self.config.count));
        let response = provider
            .generate(&request)
            .await
            .map_err(|e| RagError::Expansion(e.to_string()))?;
        if response.trim().is_empty() {
            return Err(RagError::Expansion("response contained no queries".to_string()));
        }

        let queries = parse_queries(&response, original, self.config.count);
        debug!("Expanded query into {} variants", queries.len());
        Ok(queries)
    }
}

impl std::fmt::Debug for QueryExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpander")
            .field("config", &self.config)
            .field("provider", &self.provider.as_ref().map(|p| p.kind()))
            .finish()
    }
}

fn expansion_prompt(original: &str, count: usize) -> String {
    format!(
        "You are an AI assistant. Generate {count} different search queries \
         based on the user question to retrieve relevant documents. \
         Return them as a newline-separated list. Do not number them. \
         User Question: {original}"
    )
}

/// Keep the first `count` non-empty lines, then make sure the original is
/// present.
fn parse_queries(response: &str, original: &str, count: usize) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for line in response.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if queries.len() == count {
            break;
        }
        if !queries.iter().any(|q| q == line) {
            queries.push(line.to_string());
        }
    }
    if !queries.iter().any(|q| q == original) {
        queries.push(original.to_string());
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{ProviderKind, TextStream};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Local
        }

        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String, RagError> {
            self.prompts.lock().unwrap().push(request.to_prompt());
            self.reply
                .clone()
                .map_err(|e| RagError::generation("local", e))
        }

        async fn stream_generate(&self, _request: &GenerationRequest) -> Result<TextStream, RagError> {
            Err(RagError::generation("local", "not scripted"))
        }

        async fn health_check(&self) -> Result<(), RagError> {
            Ok(())
        }
    }

    fn expander(provider: Arc<ScriptedProvider>, count: usize) -> QueryExpander {
        QueryExpander::new(
            ExpansionConfig {
                enabled: true,
                count,
            },
            Some(provider),
        )
    }

    fn expander_with_reply(reply: &str) -> QueryExpander {
        expander(ScriptedProvider::new(Ok(reply)), 3)
    }

    #[tokio::test]
    async fn test_disabled_returns_original() {
        let provider = ScriptedProvider::new(Ok("a\nb"));
        let expander = QueryExpander::new(
            ExpansionConfig {
                enabled: false,
                count: 3,
            },
            Some(provider.clone()),
        );
        assert_eq!(expander.generate_queries("q").await, vec!["q"]);
        assert!(provider.prompts.lock().unwrap().is_empty());

        assert_eq!(QueryExpander::disabled().generate_queries("q").await, vec!["q"]);
    }

    #[tokio::test]
    async fn test_provider_error_returns_original() {
        let expander = expander(ScriptedProvider::new(Err("boom")), 3);
        assert_eq!(expander.generate_queries("q").await, vec!["q"]);
    }

    #[tokio::test]
    async fn test_backend_failure_is_an_expansion_error() {
        let expander = expander(ScriptedProvider::new(Err("boom")), 3);
        match expander.expand("q").await {
            Err(RagError::Expansion(message)) => assert!(message.contains("boom")),
            other => panic!("expected expansion error, got {other:?}"),
        }

        let blank = expander_with_reply("  \n");
        assert!(matches!(blank.expand("q").await, Err(RagError::Expansion(_))));
    }

    #[test]
    fn test_is_active_needs_provider_flag_and_count() {
        assert!(expander(ScriptedProvider::new(Ok("a")), 3).is_active());
        assert!(!expander(ScriptedProvider::new(Ok("a")), 0).is_active());
        assert!(!QueryExpander::disabled().is_active());
        assert!(!QueryExpander::new(ExpansionConfig::default(), None).is_active());
    }

    #[tokio::test]
    async fn test_blank_response_returns_original() {
        let expander = expander(ScriptedProvider::new(Ok("\n  \n")), 3);
        assert_eq!(expander.generate_queries("q").await, vec!["q"]);
    }

    #[tokio::test]
    async fn test_parses_lines_and_appends_original() {
        let expander = expander(ScriptedProvider::new(Ok("  alpha \n\nbeta\ngamma\n")), 3);
        assert_eq!(
            expander.generate_queries("what is rrf").await,
            vec!["alpha", "beta", "gamma", "what is rrf"]
        );
    }

    #[tokio::test]
    async fn test_caps_at_count_plus_one() {
        let expander = expander(ScriptedProvider::new(Ok("a\nb\nc\nd\ne")), 2);
        let queries = expander.generate_queries("q").await;
        assert_eq!(queries, vec!["a", "b", "q"]);
    }

    #[tokio::test]
    async fn test_original_not_duplicated() {
        let expander = expander(ScriptedProvider::new(Ok("q\nother")), 3);
        assert_eq!(expander.generate_queries("q").await, vec!["q", "other"]);
    }

    #[tokio::test]
    async fn test_prompt_mentions_count_and_question() {
        let provider = ScriptedProvider::new(Ok("x"));
        expander(provider.clone(), 4).generate_queries("why rust").await;
        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Generate 4 different search queries"));
        assert!(prompts[0].ends_with("User Question: why rust"));
    }
}
