// ABOUTME: OpenAI chat completions provider with streaming support
// ABOUTME: Serves both the RAG answer stream and short title generation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # `OpenAI` Provider
//!
//! Talks to `{base_url}/chat/completions`. The base URL defaults to
//! <https://api.openai.com/v1> and can point at any endpoint speaking the same
//! protocol.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use super::sse_parser::create_sse_stream;
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider,
    StreamChunk, TokenUsage,
};
use crate::config::environment::OpenAiConfig;
use crate::constants::timeouts::{API_CLIENT_CONNECT_TIMEOUT_SECS, API_CLIENT_TIMEOUT_SECS};
use crate::errors::{AppError, ErrorCode};

const SERVICE_NAME: &str = "OpenAI";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for the `OpenAI` provider
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    /// Base URL for the API
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: Option<String>,
    /// Default model to use
    pub default_model: String,
}

impl OpenAiProviderConfig {
    /// Build from the server's `OpenAI` settings
    #[must_use]
    pub fn from_config(config: &OpenAiConfig, default_model: &str) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            default_model: default_model.to_owned(),
        }
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// `OpenAI` chat completions provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(API_CLIENT_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(API_CLIENT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model)
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> OpenAiRequest {
        OpenAiRequest {
            model: self.model_for(request).to_owned(),
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(stream),
        }
    }

    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.bearer_auth(api_key)
        } else {
            request
        }
    }

    async fn send(&self, body: &OpenAiRequest) -> Result<reqwest::Response, AppError> {
        let http_request = self.client.post(self.api_url("chat/completions")).json(body);

        self.add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to OpenAI: {e}");
                AppError::external_service(SERVICE_NAME, format!("Failed to connect: {e}"))
            })
    }

    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) else {
            return AppError::external_service(
                SERVICE_NAME,
                format!(
                    "API error ({status}): {}",
                    body.chars().take(200).collect::<String>()
                ),
            );
        };

        let message = error_response.error.message;
        match status.as_u16() {
            429 => AppError::new(
                ErrorCode::ExternalRateLimited,
                format!("OpenAI rate limit reached: {message}"),
            ),
            _ => AppError::external_service(
                SERVICE_NAME,
                format!(
                    "{} ({status}) - {message}",
                    error_response
                        .error
                        .error_type
                        .unwrap_or_else(|| "unknown".to_owned())
                ),
            ),
        }
    }

    fn parse_stream_data(json_str: &str) -> Option<Result<StreamChunk, AppError>> {
        match serde_json::from_str::<OpenAiStreamChunk>(json_str) {
            Ok(chunk) => chunk.choices.into_iter().next().map(|choice| {
                Ok(StreamChunk {
                    delta: choice.delta.content.unwrap_or_default(),
                    is_final: choice.finish_reason.is_some(),
                    finish_reason: choice.finish_reason,
                })
            }),
            Err(e) => {
                warn!("Failed to parse stream chunk: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only()
    }

    #[instrument(skip(self, request), fields(model = %self.model_for(request)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let response = self.send(&self.build_request(request, false)).await?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let openai_response: OpenAiResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse OpenAI response: {e}");
            AppError::external_service(SERVICE_NAME, format!("Failed to parse response: {e}"))
        })?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(SERVICE_NAME, "API returned no choices"))?;

        let content = choice.message.content.unwrap_or_default();
        debug!(
            chars = content.len(),
            finish_reason = ?choice.finish_reason,
            "Received completion"
        );

        Ok(ChatResponse {
            content,
            model: openai_response.model,
            usage: openai_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %self.model_for(request), messages = request.messages.len()))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let response = self.send(&self.build_request(request, true)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        Ok(create_sse_stream(
            response.bytes_stream(),
            Self::parse_stream_data,
            SERVICE_NAME,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_chunk_parsing() {
        let data = r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        let chunk = OpenAiProvider::parse_stream_data(data)
            .and_then(Result::ok)
            .map(|c| (c.delta, c.is_final));
        assert_eq!(chunk, Some(("Hi".to_owned(), false)));

        let done = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let chunk = OpenAiProvider::parse_stream_data(done).and_then(Result::ok);
        assert!(chunk.is_some_and(|c| c.is_final && c.delta.is_empty()));

        assert!(OpenAiProvider::parse_stream_data(r#"{"choices":[]}"#).is_none());
        assert!(OpenAiProvider::parse_stream_data("not json").is_none());
    }

    #[test]
    fn test_error_response_mapping() {
        let body = r#"{"error":{"message":"slow down","type":"rate_limit"}}"#;
        let err = OpenAiProvider::parse_error_response(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(err.code, ErrorCode::ExternalRateLimited);

        let err = OpenAiProvider::parse_error_response(
            reqwest::StatusCode::BAD_GATEWAY,
            "<html>bad gateway</html>",
        );
        assert_eq!(err.code, ErrorCode::ExternalServiceError);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_request_serialization_skips_unset_fields() {
        let provider = OpenAiProvider::new(OpenAiProviderConfig {
            base_url: "http://localhost:9/v1/".to_owned(),
            api_key: None,
            default_model: "gpt-4o-mini".to_owned(),
        })
        .unwrap();
        let request = ChatRequest::new(vec![ChatMessage::user("hello")]);
        let body = serde_json::to_value(provider.build_request(&request, true)).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("temperature").is_none());
        assert_eq!(provider.api_url("chat/completions"), "http://localhost:9/v1/chat/completions");
    }
}
