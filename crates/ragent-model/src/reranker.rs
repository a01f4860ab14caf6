//! Cross-encoder reranker client.
//!
//! Speaks the text-embeddings-inference `/rerank` protocol:
//! `{"query": ..., "texts": [...], "raw_scores": true}` answered by a list of
//! `{"index": i, "score": s}` in arbitrary order.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;
use crate::error::{ModelError, ModelResult};
use crate::http::{build_client, endpoint, read_json, send_checked};
use crate::RerankerModel;

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

#[derive(Debug, Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

/// Cross-encoder served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRerankerModel {
    client: Client,
    config: RerankerConfig,
    url: String,
}

impl HttpRerankerModel {
    /// Create a client for the configured endpoint.
    pub fn new(config: &RerankerConfig) -> ModelResult<Self> {
        let client = build_client(Some(Duration::from_secs(config.timeout_secs)))?;
        Ok(Self {
            client,
            url: endpoint(&config.base_url, "rerank"),
            config: config.clone(),
        })
    }
}

/// Map hits back onto document order; every document must be scored once.
fn scores_in_order(hits: Vec<RerankHit>, expected: usize) -> Result<Vec<f32>, String> {
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for hit in hits {
        match scores.get_mut(hit.index) {
            Some(slot) => *slot = Some(hit.score),
            None => return Err(format!("score index {} out of range", hit.index)),
        }
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| format!("no score for document {}", i)))
        .collect()
}

#[async_trait]
impl RerankerModel for HttpRerankerModel {
    async fn score_batch(&self, query: &str, documents: &[String]) -> ModelResult<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.client.post(&self.url).json(&RerankRequest {
            query,
            texts: documents,
            raw_scores: true,
        });
        let response = send_checked(request, &self.url).await?;
        let hits: Vec<RerankHit> = read_json(response, &self.url).await?;
        scores_in_order(hits, documents.len())
            .map_err(|message| ModelError::reranking_failed(&self.config.model_id, message))
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }
}
