// ABOUTME: Offline knowledge base indexing into the vector index
// ABOUTME: Chunks text files, embeds chunks in batches, and upserts them with source metadata
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # Knowledge Base Indexing
//!
//! Maintenance tooling behind the `saige-index` binary. Each `.txt` file is
//! split into overlapping windows, embedded, and upserted with
//! `{source, chunkIndex, text}` metadata. There is no delta indexing: running
//! it twice stores every chunk twice under fresh IDs.
//!
//! A file that cannot be read or embedded is logged and skipped, as is a
//! failed upsert batch.

mod chunker;

pub use chunker::TextChunker;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{error, info, instrument, warn};

use crate::constants::embeddings::DEFAULT_METRIC;
use crate::constants::indexing::{BATCH_SIZE, KNOWLEDGE_FILE_EXTENSION, VECTOR_ID_SUFFIX_LEN};
use crate::embeddings::EmbeddingProvider;
use crate::errors::{AppError, AppResult};
use crate::vector::{ChunkMetadata, VectorIndex, VectorRecord};

const CHECK_FILE_TOP_K: usize = 10;
const SAMPLE_CHARS: usize = 300;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);
const READY_MAX_POLLS: u32 = 12;

/// Outcome of an indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingReport {
    /// Files processed successfully
    pub files: usize,
    /// Files skipped after an error
    pub failed_files: usize,
    /// Vectors produced
    pub chunks: usize,
    /// Vectors the index reported as written
    pub upserted: usize,
    /// Upsert batches that failed
    pub failed_batches: usize,
}

/// Result of looking a file up in the index
#[derive(Debug, Clone, PartialEq)]
pub struct FileCheck {
    /// Number of vectors found for the file (capped by the query size)
    pub matches: usize,
    /// Start of the first match's text
    pub sample: Option<String>,
}

impl FileCheck {
    /// Whether any vector for the file exists
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.matches > 0
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(VECTOR_ID_SUFFIX_LEN)
        .map(char::from)
        .collect()
}

fn file_name(path: &Path) -> AppResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| AppError::invalid_input(format!("Not a file path: {}", path.display())))
}

/// Indexes knowledge base files into a vector index
pub struct KnowledgeBaseIndexer {
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    chunker: TextChunker,
    dimension: usize,
    batch_size: usize,
}

impl KnowledgeBaseIndexer {
    /// Create an indexer
    #[must_use]
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        chunker: TextChunker,
        dimension: usize,
    ) -> Self {
        Self {
            embeddings,
            index,
            chunker,
            dimension,
            batch_size: BATCH_SIZE,
        }
    }

    /// Override the embedding and upsert batch size
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Chunk and embed one file into vector records
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or an embedding call fails
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> AppResult<Vec<VectorRecord>> {
        let source = file_name(path)?;
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::invalid_input(format!("Failed to read {}: {e}", path.display()))
        })?;

        let chunks = self.chunker.chunk(&content);
        info!(source = %source, chunks = chunks.len(), "Split file into chunks");

        let mut records = Vec::with_capacity(chunks.len());
        for (batch_number, batch) in chunks.chunks(self.batch_size).enumerate() {
            let vectors = self.embeddings.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::external_service(
                    "Embeddings",
                    format!("Expected {} vectors, received {}", batch.len(), vectors.len()),
                ));
            }

            let offset = batch_number * self.batch_size;
            for (i, (text, values)) in batch.iter().zip(vectors).enumerate() {
                let chunk_index = offset + i;
                records.push(VectorRecord {
                    id: format!("{source}-{chunk_index}-{}", random_suffix()),
                    values,
                    metadata: ChunkMetadata {
                        source: source.clone(),
                        chunk_index,
                        text: text.clone(),
                    },
                });
            }
        }

        Ok(records)
    }

    /// Upsert records in batches, skipping batches that fail
    ///
    /// Returns `(upserted, failed_batches)`.
    pub async fn upsert_in_batches(&self, records: &[VectorRecord]) -> (usize, usize) {
        let mut upserted = 0;
        let mut failed = 0;
        for (batch_number, batch) in records.chunks(self.batch_size).enumerate() {
            match self.index.upsert(batch).await {
                Ok(count) => {
                    info!(batch = batch_number + 1, count, "Upserted batch");
                    upserted += count;
                }
                Err(e) => {
                    error!(batch = batch_number + 1, error = %e, "Failed to upsert batch");
                    failed += 1;
                }
            }
        }
        (upserted, failed)
    }

    /// Text files in `dir`, sorted by name
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed
    pub async fn list_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            AppError::invalid_input(format!("Failed to read directory {}: {e}", dir.display()))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::internal(format!("Failed to list {}: {e}", dir.display())))?
        {
            let path = entry.path();
            let is_text = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(KNOWLEDGE_FILE_EXTENSION));
            if is_text && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Index every text file in `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub async fn index_directory(&self, dir: &Path) -> AppResult<IndexingReport> {
        let files = Self::list_files(dir).await?;
        info!(files = files.len(), "Indexing knowledge base directory");

        let mut report = IndexingReport::default();
        let mut records = Vec::new();
        for path in &files {
            match self.process_file(path).await {
                Ok(file_records) => {
                    report.files += 1;
                    records.extend(file_records);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping file");
                    report.failed_files += 1;
                }
            }
        }

        report.chunks = records.len();
        if records.is_empty() {
            info!("No vectors generated to upsert");
            return Ok(report);
        }

        let (upserted, failed_batches) = self.upsert_in_batches(&records).await;
        report.upserted = upserted;
        report.failed_batches = failed_batches;
        info!(?report, "Indexing complete");
        Ok(report)
    }

    /// Index a single file; the index must already exist
    ///
    /// # Errors
    ///
    /// Returns an error if the index is missing or the file cannot be processed
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn index_file(&self, path: &Path) -> AppResult<IndexingReport> {
        if self.index.describe_index().await?.is_none() {
            return Err(AppError::not_found("Vector index"));
        }

        let records = self.process_file(path).await?;
        let (upserted, failed_batches) = self.upsert_in_batches(&records).await;
        Ok(IndexingReport {
            files: 1,
            failed_files: 0,
            chunks: records.len(),
            upserted,
            failed_batches,
        })
    }

    /// Create the index when it does not exist
    ///
    /// Returns `true` when the index was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be described or created
    pub async fn ensure_index(&self) -> AppResult<bool> {
        if let Some(description) = self.index.describe_index().await? {
            info!(name = %description.name, dimension = description.dimension, "Vector index exists");
            return Ok(false);
        }

        info!(dimension = self.dimension, "Vector index missing, creating");
        self.index.create_index(self.dimension, DEFAULT_METRIC).await?;
        self.wait_until_ready().await?;
        Ok(true)
    }

    /// Delete the index if present and create it again
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails
    pub async fn recreate_index(&self) -> AppResult<()> {
        match self.index.delete_index().await {
            Ok(()) => info!("Deleted vector index"),
            Err(e) => warn!(error = %e, "Could not delete vector index"),
        }

        self.index.create_index(self.dimension, DEFAULT_METRIC).await?;
        self.wait_until_ready().await
    }

    async fn wait_until_ready(&self) -> AppResult<()> {
        for _ in 0..READY_MAX_POLLS {
            if self
                .index
                .describe_index()
                .await?
                .is_some_and(|description| description.ready)
            {
                info!("Vector index ready");
                return Ok(());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        warn!("Vector index not ready yet, continuing");
        Ok(())
    }

    /// Look up vectors stored for `source`
    ///
    /// # Errors
    ///
    /// Returns an error if the index query fails
    pub async fn check_file(&self, source: &str) -> AppResult<FileCheck> {
        let zero = vec![0.0_f32; self.dimension];
        let matches = self
            .index
            .query(&zero, CHECK_FILE_TOP_K, Some(source))
            .await?;

        let sample = matches
            .first()
            .and_then(|m| m.metadata_str("text"))
            .map(|text| text.chars().take(SAMPLE_CHARS).collect());

        Ok(FileCheck {
            matches: matches.len(),
            sample,
        })
    }
}
