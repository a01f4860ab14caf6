//! OpenAI-compatible embedding client.
//!
//! Works against any server exposing `POST {base}/embeddings` with the OpenAI
//! request/response shape: OpenAI itself, Ollama, LM Studio, vLLM, TEI.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{ModelError, ModelResult};
use crate::http::{build_client, endpoint, read_json, send_checked};
use crate::EmbeddingModel;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Embedding model served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingModel {
    client: Client,
    config: EmbeddingConfig,
    url: String,
}

impl HttpEmbeddingModel {
    /// Create a client for the configured endpoint.
    pub fn new(config: &EmbeddingConfig) -> ModelResult<Self> {
        let client = build_client(Some(Duration::from_secs(config.timeout_secs)))?;
        Ok(Self {
            client,
            url: endpoint(&config.base_url, "embeddings"),
            config: config.clone(),
        })
    }

    async fn embed_chunk(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        let mut request = self.client.post(&self.url).json(&EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = send_checked(request, &self.url).await?;
        let body: EmbeddingResponse = read_json(response, &self.url).await?;
        order_embeddings(body.data, texts.len())
            .map_err(|message| ModelError::embedding_failed(&self.config.model, message))
    }
}

/// Put response rows back in request order and check the count.
fn order_embeddings(data: Vec<EmbeddingDatum>, expected: usize) -> Result<Vec<Vec<f32>>, String> {
    if data.len() != expected {
        return Err(format!("expected {} embeddings, got {}", expected, data.len()));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (fallback_index, datum) in data.into_iter().enumerate() {
        let index = datum.index.unwrap_or(fallback_index);
        let Some(slot) = slots.get_mut(index) else {
            return Err(format!("embedding index {} out of range", index));
        };
        if slot.is_some() {
            return Err(format!("duplicate embedding index {}", index));
        }
        *slot = Some(datum.embedding);
    }

    slots
        .into_iter()
        .map(|slot| slot.ok_or_else(|| "missing embedding".to_string()))
        .collect()
}

#[async_trait]
impl EmbeddingModel for HttpEmbeddingModel {
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = self.config.batch_size.max(1);
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size) {
            embeddings.extend(self.embed_chunk(chunk).await?);
        }

        debug!(
            "Embedded {} texts with {} ({} batches)",
            texts.len(),
            self.config.model,
            texts.len().div_ceil(batch_size)
        );
        Ok(embeddings)
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}
