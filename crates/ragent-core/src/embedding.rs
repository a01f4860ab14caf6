//! Embedding gateway seam.
//!
//! The retriever only needs text → vector. Everything else about the model
//! (transport, batching, tokenization) stays behind [`EmbeddingBackend`].

use async_trait::async_trait;

use crate::errors::RagError;

/// Trait for embedding providers.
///
/// Implementations must be deterministic for identical input and model
/// configuration, and return one vector per input in input order.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Get the model ID this backend uses.
    fn model_id(&self) -> &str;

    /// Embed a batch of text inputs.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embed a single text input.
    async fn embed(&self, input: &str) -> Result<Vec<f32>, RagError> {
        let results = self.embed_batch(&[input.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("embed_batch returned empty results".to_string()))
    }
}
