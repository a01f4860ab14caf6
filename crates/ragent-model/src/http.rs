//! Shared HTTP plumbing for the remote model clients.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tracing::trace;

use crate::error::{ModelError, ModelResult};

/// Longest error body echoed back in [`ModelError::HttpStatus`].
const MAX_ERROR_BODY: usize = 512;

/// Build a client with an optional overall request timeout.
pub(crate) fn build_client(timeout: Option<Duration>) -> ModelResult<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| ModelError::request_failed("http client", e.to_string()))
}

/// Join a base URL and a path, tolerating a trailing slash on the base.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Send a request and turn non-2xx responses into [`ModelError::HttpStatus`].
pub(crate) async fn send_checked(request: RequestBuilder, endpoint: &str) -> ModelResult<Response> {
    trace!("POST/GET {}", endpoint);
    let response = request
        .send()
        .await
        .map_err(|e| ModelError::request_failed(endpoint, e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    Err(ModelError::HttpStatus {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Read a successful response body as JSON.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
    endpoint: &str,
) -> ModelResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ModelError::request_failed(endpoint, e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ModelError::invalid_response(endpoint, e.to_string()))
}
