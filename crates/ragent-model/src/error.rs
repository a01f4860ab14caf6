//! Error types for ragent-model.
//!
//! Every variant names the endpoint or model involved so a failed request can
//! be traced back to the configuration entry that produced it.

use thiserror::Error;

/// Result type alias for ragent-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in ragent-model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Transport errors
    // ========================================================================
    /// The request could not be sent or no response arrived.
    #[error("Request to {endpoint} failed: {message}")]
    RequestFailed { endpoint: String, message: String },

    /// The server answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("Unexpected response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    /// A streaming response broke off or carried an unreadable event.
    #[error("Stream error: {message}")]
    Stream { message: String },

    // ========================================================================
    // Inference errors
    // ========================================================================
    /// Embedding generation failed.
    #[error("Embedding failed for model '{model_id}': {message}")]
    EmbeddingFailed { model_id: String, message: String },

    /// Reranking failed.
    #[error("Reranking failed for model '{model_id}': {message}")]
    RerankingFailed { model_id: String, message: String },

    // ========================================================================
    // Provider errors
    // ========================================================================
    /// Provider not available (missing key, bad base URL).
    #[error("Provider '{provider}' not available: {reason}")]
    ProviderNotAvailable { provider: String, reason: String },

    // ========================================================================
    // Serialization errors
    // ========================================================================
    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error constructors
// ============================================================================

impl ModelError {
    /// Create a request failed error.
    pub fn request_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Create an embedding failed error.
    pub fn embedding_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a reranking failed error.
    pub fn reranking_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RerankingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a provider not available error.
    pub fn provider_not_available(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderNotAvailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}
