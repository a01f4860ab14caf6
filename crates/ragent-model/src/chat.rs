//! Chat-completion clients for the supported generation backends.
//!
//! Two wire protocols cover every provider ragent knows about:
//!
//! - [`OpenAiChatModel`]: `POST {base}/chat/completions` (OpenAI, Groq, and
//!   local OpenAI-compatible servers such as Ollama or LM Studio)
//! - [`GeminiChatModel`]: `POST {base}/models/{model}:generateContent`
//!
//! Both support incremental output over server-sent events.

use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::{ChatApiKind, ChatConfig};
use crate::error::{ModelError, ModelResult};
use crate::http::{build_client, endpoint, read_json, send_checked};
use crate::sse;
use crate::{ChatModel, FragmentStream};

/// Payload that terminates an OpenAI-style event stream.
const DONE_SENTINEL: &str = "[DONE]";

// ============================================================================
// Messages
// ============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Role name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

// ============================================================================
// OpenAI-compatible
// ============================================================================

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionContent>,
    #[serde(default)]
    delta: Option<CompletionContent>,
}

#[derive(Debug, Deserialize)]
struct CompletionContent {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: Client,
    config: ChatConfig,
    url: String,
}

impl OpenAiChatModel {
    /// Create a client for the configured endpoint.
    pub fn new(config: &ChatConfig) -> ModelResult<Self> {
        let client = build_client(config.timeout_secs.map(Duration::from_secs))?;
        Ok(Self {
            client,
            url: endpoint(&config.base_url, "chat/completions"),
            config: config.clone(),
        })
    }

    fn request(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        stream: bool,
    ) -> reqwest::RequestBuilder {
        let body = json!({
            "model": model.unwrap_or(&self.config.model),
            "messages": messages,
            "temperature": self.config.temperature,
            "stream": stream,
        });
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        request
    }
}

/// Extract the assistant text from a non-streaming completion.
fn parse_completion(body: CompletionResponse) -> Option<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
}

/// Extract the text delta from one streamed completion chunk.
fn parse_completion_delta(data: &str) -> ModelResult<Option<String>> {
    let chunk: CompletionResponse = serde_json::from_str(data)
        .map_err(|e| ModelError::stream(format!("bad completion chunk: {}", e)))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|text| !text.is_empty()))
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage], model: Option<&str>) -> ModelResult<String> {
        let response = send_checked(self.request(messages, model, false), &self.url).await?;
        let body: CompletionResponse = read_json(response, &self.url).await?;
        parse_completion(body)
            .ok_or_else(|| ModelError::invalid_response(&self.url, "completion has no content"))
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> ModelResult<FragmentStream> {
        let response = send_checked(self.request(messages, model, true), &self.url).await?;
        debug!("Streaming completion from {}", self.url);

        let fragments = sse::data_stream(response)
            .take_while(|item| {
                future::ready(!matches!(item, Ok(data) if data.trim() == DONE_SENTINEL))
            })
            .filter_map(|item| {
                future::ready(match item {
                    Ok(data) => parse_completion_delta(&data).transpose(),
                    Err(e) => Some(Err(e)),
                })
            })
            .boxed();
        Ok(fragments)
    }

    async fn ping(&self) -> ModelResult<()> {
        let url = endpoint(&self.config.base_url, "models");
        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        send_checked(request, &url).await.map(|_| ())
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn api(&self) -> ChatApiKind {
        ChatApiKind::OpenAiCompatible
    }
}

// ============================================================================
// Gemini
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiChatModel {
    client: Client,
    config: ChatConfig,
}

impl GeminiChatModel {
    /// Create a client for the configured endpoint.
    pub fn new(config: &ChatConfig) -> ModelResult<Self> {
        let client = build_client(config.timeout_secs.map(Duration::from_secs))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn api_key(&self) -> ModelResult<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ModelError::provider_not_available("gemini", "no API key configured"))
    }

    fn method_url(&self, model: Option<&str>, method: &str) -> String {
        let model = model.unwrap_or(&self.config.model);
        endpoint(&self.config.base_url, &format!("models/{}:{}", model, method))
    }
}

/// Build a `generateContent` body. System messages become the system
/// instruction; assistant turns use Gemini's `model` role.
fn gemini_body(messages: &[ChatMessage], temperature: f32) -> serde_json::Value {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == ChatRole::System)
        .map(|m| m.content.as_str())
        .collect();

    let contents: Vec<serde_json::Value> = messages
        .iter()
        .filter(|m| m.role != ChatRole::System)
        .map(|m| {
            let role = if m.role == ChatRole::Assistant { "model" } else { "user" };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut body = json!({
        "contents": contents,
        "generationConfig": { "temperature": temperature },
    });
    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
    }
    body
}

/// Concatenate the text parts of the first candidate.
fn gemini_text(body: GeminiResponse) -> Option<String> {
    let content = body.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    Some(text)
}

fn parse_gemini_chunk(data: &str) -> ModelResult<Option<String>> {
    let chunk: GeminiResponse = serde_json::from_str(data)
        .map_err(|e| ModelError::stream(format!("bad gemini chunk: {}", e)))?;
    Ok(gemini_text(chunk).filter(|text| !text.is_empty()))
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    async fn complete(&self, messages: &[ChatMessage], model: Option<&str>) -> ModelResult<String> {
        let url = self.method_url(model, "generateContent");
        let request = self
            .client
            .post(&url)
            .query(&[("key", self.api_key()?)])
            .json(&gemini_body(messages, self.config.temperature));
        let response = send_checked(request, &url).await?;
        let body: GeminiResponse = read_json(response, &url).await?;
        gemini_text(body).ok_or_else(|| ModelError::invalid_response(&url, "no candidates"))
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> ModelResult<FragmentStream> {
        let url = self.method_url(model, "streamGenerateContent");
        let request = self
            .client
            .post(&url)
            .query(&[("alt", "sse"), ("key", self.api_key()?)])
            .json(&gemini_body(messages, self.config.temperature));
        let response = send_checked(request, &url).await?;
        debug!("Streaming completion from {}", url);

        let fragments = sse::data_stream(response)
            .filter_map(|item| {
                future::ready(match item {
                    Ok(data) => parse_gemini_chunk(&data).transpose(),
                    Err(e) => Some(Err(e)),
                })
            })
            .boxed();
        Ok(fragments)
    }

    async fn ping(&self) -> ModelResult<()> {
        let url = endpoint(&self.config.base_url, "models");
        let request = self.client.get(&url).query(&[("key", self.api_key()?)]);
        send_checked(request, &url).await.map(|_| ())
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn api(&self) -> ChatApiKind {
        ChatApiKind::Gemini
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let body: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(parse_completion(body), Some("hi".to_string()));
    }

    #[test]
    fn test_parse_completion_null_content() {
        let body: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(parse_completion(body), None);
    }

    #[test]
    fn test_parse_completion_delta() {
        let text = parse_completion_delta(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap();
        assert_eq!(text, Some("Hel".to_string()));

        let role_only = parse_completion_delta(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#);
        assert_eq!(role_only.unwrap(), None);

        assert!(parse_completion_delta("not json").is_err());
    }

    #[test]
    fn test_gemini_body_roles() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage {
                role: ChatRole::Assistant,
                content: "hello".to_string(),
            },
        ];
        let body = gemini_body(&messages, 0.2);
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
    }

    #[test]
    fn test_parse_gemini_chunk() {
        let text = parse_gemini_chunk(
            r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(text, Some("ab".to_string()));
        assert_eq!(parse_gemini_chunk(r#"{"candidates":[]}"#).unwrap(), None);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::user("q")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"q"}"#);
    }
}
