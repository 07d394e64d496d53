// ABOUTME: OpenAI embeddings client for query and chunk vectors
// ABOUTME: Posts batches to /embeddings and restores input order from the response indexes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{prepare_input, EmbeddingProvider};
use crate::config::environment::OpenAiConfig;
use crate::constants::timeouts::{API_CLIENT_CONNECT_TIMEOUT_SECS, API_CLIENT_TIMEOUT_SECS};
use crate::errors::{AppError, AppResult};

const SERVICE_NAME: &str = "OpenAI Embeddings";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embeddings from `{base_url}/embeddings`
pub struct OpenAiEmbeddings {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiEmbeddings {
    /// Create a client from the server's `OpenAI` settings
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &OpenAiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(API_CLIENT_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(API_CLIENT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, texts), fields(model = %self.model, inputs = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts.iter().map(|t| prepare_input(t)).collect(),
        };

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body);
        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!("Failed to send embeddings request: {e}");
            AppError::external_service(SERVICE_NAME, format!("Failed to connect: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                SERVICE_NAME,
                format!(
                    "API error ({status}): {}",
                    text.chars().take(200).collect::<String>()
                ),
            ));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("Failed to parse response: {e}"))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(AppError::external_service(
                SERVICE_NAME,
                format!(
                    "Expected {} embeddings, received {}",
                    texts.len(),
                    parsed.data.len()
                ),
            ));
        }

        parsed.data.sort_by_key(|d| d.index);
        debug!(
            dimension = parsed.data.first().map_or(0, |d| d.embedding.len()),
            "Embedded batch"
        );
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
