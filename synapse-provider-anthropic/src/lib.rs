#![deny(missing_docs)]
//! Reference [`Provider`] implementation against Anthropic's Messages API.
//!
//! Grounded in `neuron-provider-anthropic`, generalized for the richer
//! `synapse_types` content model (extended thinking, structured tool-result
//! content, tool choice) and given a real SSE streaming path rather than the
//! teacher's unwired one.

mod mapping;
mod streaming;
mod types;

use std::time::Duration;

use synapse_types::{CompletionRequest, CompletionResponse, Provider, ProviderError, StreamHandle, TokenUsage};

use crate::types::{AnthropicErrorResponse, AnthropicResponse};

/// Anthropic's default model, used whenever a [`CompletionRequest`] leaves
/// `model` empty rather than naming one explicitly.
const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API [`Provider`].
pub struct AnthropicProvider {
    api_key: String,
    client: reqwest::Client,
    api_url: String,
    api_version: String,
    default_model: String,
}

impl AnthropicProvider {
    /// Creates a provider against the production Anthropic API.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            api_version: API_VERSION.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Overrides the API endpoint, for testing or proxying.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Overrides the model used when a request leaves `model` empty.
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn request_builder(&self, body: &crate::types::AnthropicRequest) -> reqwest::RequestBuilder {
        self.client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(body)
    }
}

impl Clone for AnthropicProvider {
    fn clone(&self) -> Self {
        Self {
            api_key: self.api_key.clone(),
            client: self.client.clone(),
            api_url: self.api_url.clone(),
            api_version: self.api_version.clone(),
            default_model: self.default_model.clone(),
        }
    }
}

/// Maps a non-2xx HTTP response to a [`ProviderError`], reading the Anthropic
/// error envelope when present and falling back to the raw body otherwise.
async fn map_error_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    classify_error(status, retry_after, &body)
}

/// Pure counterpart of [`map_error_response`], split out so the status-code
/// mapping can be exercised without standing up an HTTP server.
fn classify_error(status: reqwest::StatusCode, retry_after: Option<Duration>, body: &str) -> ProviderError {
    let message = serde_json::from_str::<AnthropicErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        reqwest::StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit { retry_after },
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            ProviderError::Authentication(message)
        }
        reqwest::StatusCode::NOT_FOUND => ProviderError::ModelNotFound(message),
        reqwest::StatusCode::BAD_REQUEST if message.to_lowercase().contains("context") => {
            ProviderError::ContextLength(message)
        }
        _ => ProviderError::Other(format!("HTTP {status}: {message}")),
    }
}

impl Provider for AnthropicProvider {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, ProviderError>> + Send {
        let api_request = mapping::build_request(&request, &self.default_model, false);
        let http_request = self.request_builder(&api_request);

        async move {
            let response = http_request
                .send()
                .await
                .map_err(|e| ProviderError::Other(format!("request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(map_error_response(response).await);
            }

            let body: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Other(format!("invalid response body: {e}")))?;

            Ok(response_from_anthropic(body))
        }
    }

    fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<StreamHandle, ProviderError>> + Send {
        let api_request = mapping::build_request(&request, &self.default_model, true);
        let http_request = self.request_builder(&api_request);

        async move {
            let response = http_request
                .send()
                .await
                .map_err(|e| ProviderError::Other(format!("request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(map_error_response(response).await);
            }

            Ok(streaming::stream_completion(response))
        }
    }
}

fn response_from_anthropic(response: AnthropicResponse) -> CompletionResponse {
    let usage: TokenUsage = mapping::anthropic_usage_to_token_usage(response.usage);
    let content = response.content.into_iter().map(mapping::anthropic_block_to_content_block).collect();
    CompletionResponse {
        id: response.id,
        model: response.model,
        message: synapse_types::Message { role: synapse_types::Role::Assistant, content },
        usage,
        stop_reason: mapping::stop_reason_from_anthropic(&response.stop_reason),
    }
}
