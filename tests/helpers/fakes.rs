// ABOUTME: In-process fakes for the completion, embedding, and vector index seams
// ABOUTME: Scripted replies and deterministic vectors so route tests never leave the process
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use saige_server::embeddings::EmbeddingProvider;
use saige_server::errors::{AppError, AppResult};
use saige_server::llm::{
    ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider, StreamChunk,
};
use saige_server::rag::ContextRetriever;
use saige_server::vector::{
    ChunkMetadata, IndexDescription, InMemoryVectorIndex, VectorIndex, VectorMatch, VectorRecord,
};

/// Dimension of [`MockEmbeddings`] vectors
pub const MOCK_DIMENSION: usize = 26;

// ============================================================================
// Completion provider
// ============================================================================

/// Completion provider replaying scripted output
pub struct MockLlmProvider {
    title: Option<String>,
    deltas: Vec<String>,
    fail_stream_after: Option<usize>,
    fail_stream_start: bool,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmProvider {
    /// Stream `deltas` as the reply and answer title requests with a fixed title
    pub fn new(deltas: &[&str]) -> Self {
        Self {
            title: Some("Sterilization Steps".to_owned()),
            deltas: deltas.iter().map(|d| (*d).to_owned()).collect(),
            fail_stream_after: None,
            fail_stream_start: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer title requests with `title`
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    /// Fail every non-streaming request
    pub fn failing_title(mut self) -> Self {
        self.title = None;
        self
    }

    /// Yield an error after `count` deltas
    pub fn failing_stream_after(mut self, count: usize) -> Self {
        self.fail_stream_after = Some(count);
        self
    }

    /// Refuse to open a stream at all
    pub fn failing_stream_start(mut self) -> Self {
        self.fail_stream_start = true;
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The most recent streaming request
    pub fn last_stream_request(&self) -> Option<ChatRequest> {
        self.requests().into_iter().rev().find(|r| r.stream)
    }

    /// Number of non-streaming (title) requests
    pub fn title_requests(&self) -> usize {
        self.requests().iter().filter(|r| !r.stream).count()
    }

    fn record(&self, request: &ChatRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.record(request);
        let title = self
            .title
            .clone()
            .ok_or_else(|| AppError::external_service("Mock", "title unavailable"))?;
        Ok(ChatResponse {
            content: title,
            model: request.model.clone().unwrap_or_default(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.record(request);
        if self.fail_stream_start {
            return Err(AppError::external_service("Mock", "stream unavailable"));
        }

        let mut items: Vec<Result<StreamChunk, AppError>> = Vec::new();
        for (i, delta) in self.deltas.iter().enumerate() {
            if self.fail_stream_after == Some(i) {
                items.push(Err(AppError::external_service("Mock", "connection reset")));
                return Ok(Box::pin(stream::iter(items)));
            }
            items.push(Ok(StreamChunk {
                delta: delta.clone(),
                is_final: false,
                finish_reason: None,
            }));
        }
        if self.fail_stream_after == Some(self.deltas.len()) {
            items.push(Err(AppError::external_service("Mock", "connection reset")));
        } else {
            items.push(Ok(StreamChunk {
                delta: String::new(),
                is_final: true,
                finish_reason: Some("stop".to_owned()),
            }));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

// ============================================================================
// Embeddings
// ============================================================================

/// Letter-frequency vector over `a..=z`
pub fn letter_vector(text: &str) -> Vec<f32> {
    let mut values = vec![0.0_f32; MOCK_DIMENSION];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        let slot = (c.to_ascii_lowercase() as u8 - b'a') as usize;
        values[slot] += 1.0;
    }
    values
}

/// Embeddings built from letter frequencies
///
/// Texts sharing vocabulary land close together, which is enough for ranking
/// assertions.
#[derive(Default)]
pub struct MockEmbeddings {
    calls: AtomicUsize,
    inputs: AtomicUsize,
}

impl MockEmbeddings {
    /// Number of `embed_batch` calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total number of texts embedded
    pub fn inputs(&self) -> usize {
        self.inputs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddings {
    fn model(&self) -> &str {
        "mock-letters"
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }
}

/// Embeddings provider that always fails
pub struct FailingEmbeddings;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddings {
    fn model(&self) -> &str {
        "failing"
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::external_service("Embeddings", "quota exceeded"))
    }
}

// ============================================================================
// Vector index
// ============================================================================

/// Index that fails every query
pub struct FailingVectorIndex;

#[async_trait]
impl VectorIndex for FailingVectorIndex {
    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _source: Option<&str>,
    ) -> AppResult<Vec<VectorMatch>> {
        Err(AppError::external_service("Pinecone", "index unavailable"))
    }

    async fn upsert(&self, _records: &[VectorRecord]) -> AppResult<usize> {
        Err(AppError::external_service("Pinecone", "index unavailable"))
    }

    async fn describe_index(&self) -> AppResult<Option<IndexDescription>> {
        Ok(None)
    }

    async fn create_index(&self, _dimension: usize, _metric: &str) -> AppResult<()> {
        Ok(())
    }

    async fn delete_index(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Vector record for `text` embedded with [`letter_vector`]
pub fn knowledge_record(id: &str, source: &str, chunk_index: usize, text: &str) -> VectorRecord {
    VectorRecord {
        id: id.to_owned(),
        values: letter_vector(text),
        metadata: ChunkMetadata {
            source: source.to_owned(),
            chunk_index,
            text: text.to_owned(),
        },
    }
}

/// In-memory index seeded with `(source, text)` snippets
pub async fn seeded_index(snippets: &[(&str, &str)]) -> Arc<InMemoryVectorIndex> {
    let index = Arc::new(InMemoryVectorIndex::new("saige-test"));
    let records: Vec<VectorRecord> = snippets
        .iter()
        .enumerate()
        .map(|(i, (source, text))| knowledge_record(&format!("{source}-{i}"), source, i, text))
        .collect();
    if !records.is_empty() {
        index.upsert(&records).await.unwrap();
    }
    index
}

/// Retriever over mock embeddings and `index`
pub fn mock_retriever(index: Arc<dyn VectorIndex>, top_k: usize) -> ContextRetriever {
    ContextRetriever::new(Arc::new(MockEmbeddings::default()), index, top_k)
}
