// ABOUTME: Text embedding abstraction used by retrieval and offline indexing
// ABOUTME: Hosted embeddings are reached through the EmbeddingProvider trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # Embeddings
//!
//! Queries and knowledge base chunks are embedded by the same provider so their
//! vectors are comparable. Newlines are replaced by spaces before embedding.

mod openai;

pub use openai::OpenAiEmbeddings;

use async_trait::async_trait;

use crate::errors::{AppError, AppResult};

/// Normalize text before sending it to an embeddings model
#[must_use]
pub fn prepare_input(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Provider of dense text embeddings
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding model identifier
    fn model(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_owned()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::external_service("Embeddings", "No embedding returned"))
    }
}
