// ABOUTME: Nearest-neighbor vector index abstraction for knowledge base chunks
// ABOUTME: Defines records, matches, and index management shared by Pinecone and in-memory backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # Vector Index
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`query`](VectorIndex::query) | Top-K nearest neighbors, optionally restricted to one source file |
//! | [`upsert`](VectorIndex::upsert) | Insert or replace a batch of vectors |
//! | [`describe_index`](VectorIndex::describe_index) | Index settings, `None` when missing |
//! | [`create_index`](VectorIndex::create_index) | Create the index |
//! | [`delete_index`](VectorIndex::delete_index) | Drop the index and its vectors |

mod memory;
mod pinecone;

pub use memory::InMemoryVectorIndex;
pub use pinecone::PineconeIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppResult;

/// Metadata stored with every knowledge base chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// File the chunk was cut from
    pub source: String,
    /// Position of the chunk within its file
    pub chunk_index: usize,
    /// Chunk text
    pub text: String,
}

/// A vector to upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Vector ID, `{file}-{chunkIndex}-{suffix}`
    pub id: String,
    /// Embedding values
    pub values: Vec<f32>,
    /// Chunk metadata
    pub metadata: ChunkMetadata,
}

/// One nearest-neighbor result
///
/// Metadata is kept loose: vectors written by other tools may lack fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorMatch {
    /// Vector ID
    pub id: String,
    /// Similarity score
    #[serde(default)]
    pub score: f32,
    /// Stored metadata, if any
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl VectorMatch {
    /// String field from the match metadata
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }
}

/// Index settings reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescription {
    /// Index name
    pub name: String,
    /// Vector dimension
    pub dimension: usize,
    /// Distance metric
    pub metric: String,
    /// Whether the index accepts reads and writes
    pub ready: bool,
}

/// Nearest-neighbor index over knowledge base chunks
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` nearest vectors with their metadata
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        source: Option<&str>,
    ) -> AppResult<Vec<VectorMatch>>;

    /// Insert or replace vectors, returning the number written
    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<usize>;

    /// Describe the index, `None` when it does not exist
    async fn describe_index(&self) -> AppResult<Option<IndexDescription>>;

    /// Create the index
    async fn create_index(&self, dimension: usize, metric: &str) -> AppResult<()>;

    /// Delete the index
    async fn delete_index(&self) -> AppResult<()>;
}
