// ABOUTME: Knowledge base context retrieval for chat requests
// ABOUTME: Embeds the user's question, queries the vector index, and joins matched snippets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # Context Retrieval
//!
//! Retrieval never fails a chat request: embedding or index errors are logged
//! and the answer proceeds with an empty context block.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::constants::rag::CONTEXT_SEPARATOR;
use crate::embeddings::EmbeddingProvider;
use crate::errors::AppResult;
use crate::models::ContextChunk;
use crate::vector::VectorIndex;

/// Retrieves knowledge base snippets relevant to a question
#[derive(Clone)]
pub struct ContextRetriever {
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl ContextRetriever {
    /// Create a retriever returning at most `top_k` snippets
    #[must_use]
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
    ) -> Self {
        Self {
            embeddings,
            index,
            top_k,
        }
    }

    /// Number of neighbors requested per query
    #[must_use]
    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    /// Snippets for `query`, best match first
    ///
    /// Blank queries make no external calls. Failures degrade to an empty list.
    #[instrument(skip(self, query), fields(top_k = self.top_k, query_len = query.len()))]
    pub async fn retrieve(&self, query: &str) -> Vec<ContextChunk> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let started = Instant::now();
        match self.search(query).await {
            Ok(chunks) => {
                debug!(
                    chunks = chunks.len(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Retrieved context"
                );
                chunks
            }
            Err(e) => {
                warn!(error = %e, "Context retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }

    /// Context block for `query`, ready to drop into the system prompt
    pub async fn retrieve_context(&self, query: &str) -> String {
        context_block(&self.retrieve(query).await)
    }

    async fn search(&self, query: &str) -> AppResult<Vec<ContextChunk>> {
        let vector = self.embeddings.embed(query).await?;
        let matches = self.index.query(&vector, self.top_k, None).await?;

        Ok(matches
            .iter()
            .filter_map(|m| {
                let text = m.metadata_str("text")?;
                Some(ContextChunk {
                    text: text.to_owned(),
                    source: m.metadata_str("source").unwrap_or_default().to_owned(),
                    relevance_score: m.score,
                })
            })
            .collect())
    }
}

/// Join snippet texts with a blank line between them
#[must_use]
pub fn context_block(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
