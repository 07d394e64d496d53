// ABOUTME: Pinecone REST client for the knowledge base vector index
// ABOUTME: Data plane queries and upserts go to the index host, management calls to the controller
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # Pinecone Index
//!
//! The index host is taken from `PINECONE_INDEX_HOST` when set, otherwise it
//! is looked up once through the controller and cached.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::{IndexDescription, VectorIndex, VectorMatch, VectorRecord};
use crate::config::environment::VectorIndexConfig;
use crate::constants::timeouts::{API_CLIENT_CONNECT_TIMEOUT_SECS, API_CLIENT_TIMEOUT_SECS};
use crate::errors::{AppError, AppResult};

const SERVICE_NAME: &str = "Pinecone";
const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";
const API_VERSION: &str = "2024-07";
const SERVERLESS_CLOUD: &str = "aws";
const SERVERLESS_REGION: &str = "us-east-1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    metric: String,
    host: String,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

/// Pinecone-hosted vector index
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    index_name: String,
    controller_url: String,
    namespace: Option<String>,
    host: RwLock<Option<String>>,
}

impl PineconeIndex {
    /// Create a client for the configured index
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or the HTTP client cannot be built
    pub fn new(config: &VectorIndexConfig) -> AppResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::config("PINECONE_API_KEY is not set"))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(API_CLIENT_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(API_CLIENT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            index_name: config.index_name.clone(),
            controller_url: config.controller_url.trim_end_matches('/').to_owned(),
            namespace: config.namespace.clone(),
            host: RwLock::new(config.index_host.as_deref().map(normalize_host)),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Api-Key", &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
    }

    fn index_url(&self) -> String {
        format!("{}/indexes/{}", self.controller_url, self.index_name)
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        self.authorized(request)
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE_NAME, format!("Request failed: {e}")))
    }

    async fn fetch_index_model(&self) -> AppResult<Option<IndexModel>> {
        let response = self.send(self.client.get(self.index_url())).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let model = response.json::<IndexModel>().await.map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("Failed to parse index: {e}"))
        })?;
        Ok(Some(model))
    }

    async fn data_host(&self) -> AppResult<String> {
        if let Some(host) = self.host.read().await.clone() {
            return Ok(host);
        }

        let model = self
            .fetch_index_model()
            .await?
            .ok_or_else(|| AppError::not_found(format!("Vector index {}", self.index_name)))?;
        let host = normalize_host(&model.host);
        debug!(host = %host, "Resolved index host");
        *self.host.write().await = Some(host.clone());
        Ok(host)
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    }
}

async fn check_status(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::external_service(
        SERVICE_NAME,
        format!(
            "API error ({status}): {}",
            body.chars().take(200).collect::<String>()
        ),
    ))
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    #[instrument(skip(self, vector), fields(index = %self.index_name))]
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        source: Option<&str>,
    ) -> AppResult<Vec<VectorMatch>> {
        let host = self.data_host().await?;
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
            filter: source.map(|s| json!({ "source": s })),
        };

        let response = self
            .send(self.client.post(format!("{host}/query")).json(&body))
            .await?;
        let parsed = check_status(response)
            .await?
            .json::<QueryResponse>()
            .await
            .map_err(|e| {
                AppError::external_service(SERVICE_NAME, format!("Failed to parse query: {e}"))
            })?;

        debug!(matches = parsed.matches.len(), "Vector query complete");
        Ok(parsed.matches)
    }

    #[instrument(skip(self, records), fields(index = %self.index_name, count = records.len()))]
    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let host = self.data_host().await?;
        let body = UpsertRequest {
            vectors: records,
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .send(self.client.post(format!("{host}/vectors/upsert")).json(&body))
            .await?;
        let parsed = check_status(response)
            .await?
            .json::<UpsertResponse>()
            .await
            .map_err(|e| {
                AppError::external_service(SERVICE_NAME, format!("Failed to parse upsert: {e}"))
            })?;

        Ok(parsed.upserted_count)
    }

    async fn describe_index(&self) -> AppResult<Option<IndexDescription>> {
        Ok(self.fetch_index_model().await?.map(|model| IndexDescription {
            name: model.name,
            dimension: model.dimension,
            metric: model.metric,
            ready: model.status.is_some_and(|s| s.ready),
        }))
    }

    #[instrument(skip(self), fields(index = %self.index_name))]
    async fn create_index(&self, dimension: usize, metric: &str) -> AppResult<()> {
        let body = json!({
            "name": self.index_name,
            "dimension": dimension,
            "metric": metric,
            "spec": {
                "serverless": { "cloud": SERVERLESS_CLOUD, "region": SERVERLESS_REGION }
            }
        });

        let response = self
            .send(
                self.client
                    .post(format!("{}/indexes", self.controller_url))
                    .json(&body),
            )
            .await?;
        check_status(response).await?;
        info!(dimension, metric, "Created vector index");
        Ok(())
    }

    #[instrument(skip(self), fields(index = %self.index_name))]
    async fn delete_index(&self) -> AppResult<()> {
        let response = self.send(self.client.delete(self.index_url())).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::not_found(format!(
                "Vector index {}",
                self.index_name
            )));
        }
        check_status(response).await?;
        *self.host.write().await = None;
        info!("Deleted vector index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("kb-abc.svc.pinecone.io"), "https://kb-abc.svc.pinecone.io");
        assert_eq!(normalize_host("http://localhost:5080/"), "http://localhost:5080");
    }

    #[test]
    fn test_query_body_shape() {
        let vector = [0.5_f32, 0.25];
        let body = QueryRequest {
            vector: &vector,
            top_k: 5,
            include_metadata: true,
            include_values: false,
            namespace: None,
            filter: Some(json!({ "source": "billing.txt" })),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["topK"], 5);
        assert_eq!(value["includeMetadata"], true);
        assert_eq!(value["filter"]["source"], "billing.txt");
        assert!(value.get("namespace").is_none());
    }

    #[test]
    fn test_query_response_tolerates_missing_metadata() {
        let parsed: QueryResponse = serde_json::from_str(
            r#"{"matches":[{"id":"a","score":0.9,"metadata":{"text":"x","source":"f.txt","chunkIndex":0}},{"id":"b","score":0.5}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.matches.len(), 2);
        assert_eq!(parsed.matches[0].metadata_str("text"), Some("x"));
        assert!(parsed.matches[1].metadata.is_none());
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = VectorIndexConfig {
            api_key: None,
            index_name: "kb".to_owned(),
            index_host: None,
            controller_url: "https://api.pinecone.io".to_owned(),
            namespace: None,
            dimension: 1536,
        };
        assert!(PineconeIndex::new(&config).is_err());
    }
}
