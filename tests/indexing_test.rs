// ABOUTME: Integration tests for knowledge base indexing into a vector index
// ABOUTME: Uses temporary directories, letter-frequency embeddings, and the in-memory index
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::path::Path;
use std::sync::Arc;

use helpers::fakes::{FailingEmbeddings, MockEmbeddings, MOCK_DIMENSION};
use saige_server::embeddings::EmbeddingProvider;
use saige_server::indexing::{KnowledgeBaseIndexer, TextChunker};
use saige_server::vector::{InMemoryVectorIndex, VectorIndex};
use tempfile::TempDir;

fn indexer_with(
    embeddings: Arc<dyn EmbeddingProvider>,
    index: &Arc<InMemoryVectorIndex>,
) -> KnowledgeBaseIndexer {
    KnowledgeBaseIndexer::new(
        embeddings,
        Arc::clone(index) as Arc<dyn VectorIndex>,
        TextChunker::new(40, 5).unwrap(),
        MOCK_DIMENSION,
    )
}

fn knowledge_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("billing.txt"),
        "Submit insurance claims within thirty days. Attach radiographs for crowns and bridges.",
    )
    .unwrap();
    std::fs::write(dir.path().join("hygiene.txt"), "Autoclave handpieces.").unwrap();
    std::fs::write(dir.path().join("notes.md"), "Not part of the knowledge base.").unwrap();
    std::fs::create_dir(dir.path().join("archive.txt")).unwrap();
    dir
}

#[tokio::test]
async fn test_list_files_only_text_files_sorted() {
    let dir = knowledge_dir();
    let files = KnowledgeBaseIndexer::list_files(dir.path()).await.unwrap();
    let names: Vec<&str> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap())
        .collect();
    assert_eq!(names, vec!["billing.txt", "hygiene.txt"]);
}

#[tokio::test]
async fn test_index_directory_upserts_every_chunk() {
    common::init_test_logging();
    let dir = knowledge_dir();
    let index = Arc::new(InMemoryVectorIndex::new("kb"));
    let embeddings = Arc::new(MockEmbeddings::default());
    let indexer = indexer_with(Arc::clone(&embeddings) as Arc<dyn EmbeddingProvider>, &index)
        .with_batch_size(2);

    let report = indexer.index_directory(dir.path()).await.unwrap();

    assert_eq!(report.files, 2);
    assert_eq!(report.failed_files, 0);
    assert_eq!(report.chunks, report.upserted);
    assert_eq!(report.failed_batches, 0);
    assert_eq!(index.len().await, report.chunks);
    assert_eq!(embeddings.inputs(), report.chunks);
    assert!(embeddings.calls() >= report.chunks.div_ceil(2));

    let ids = index.ids().await;
    let billing: Vec<&String> = ids.iter().filter(|id| id.starts_with("billing.txt-")).collect();
    assert!(billing.len() > 1);
    for id in &ids {
        let suffix = id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 10);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
    assert!(ids.iter().any(|id| id.starts_with("hygiene.txt-0-")));
}

#[tokio::test]
async fn test_records_carry_source_metadata() {
    let dir = knowledge_dir();
    let index = Arc::new(InMemoryVectorIndex::new("kb"));
    let indexer = indexer_with(Arc::new(MockEmbeddings::default()), &index);

    let records = indexer
        .process_file(&dir.path().join("billing.txt"))
        .await
        .unwrap();

    assert!(records.len() > 1);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.metadata.source, "billing.txt");
        assert_eq!(record.metadata.chunk_index, i);
        assert!(record.id.starts_with(&format!("billing.txt-{i}-")));
        assert_eq!(record.values.len(), MOCK_DIMENSION);
        assert!(record.metadata.text.chars().count() <= 40);
    }
    assert!(records[0].metadata.text.starts_with("Submit insurance claims"));
}

#[tokio::test]
async fn test_reindexing_duplicates_vectors() {
    let dir = knowledge_dir();
    let index = Arc::new(InMemoryVectorIndex::new("kb"));
    let indexer = indexer_with(Arc::new(MockEmbeddings::default()), &index);

    let first = indexer.index_directory(dir.path()).await.unwrap();
    indexer.index_directory(dir.path()).await.unwrap();

    assert_eq!(index.len().await, first.chunks * 2);
}

#[tokio::test]
async fn test_embedding_failure_skips_file() {
    let dir = knowledge_dir();
    let index = Arc::new(InMemoryVectorIndex::new("kb"));
    let indexer = indexer_with(Arc::new(FailingEmbeddings), &index);

    let report = indexer.index_directory(dir.path()).await.unwrap();

    assert_eq!(report.files, 0);
    assert_eq!(report.failed_files, 2);
    assert_eq!(report.upserted, 0);
    assert!(index.is_empty().await);
}

#[tokio::test]
async fn test_missing_directory_is_error() {
    let index = Arc::new(InMemoryVectorIndex::new("kb"));
    let indexer = indexer_with(Arc::new(MockEmbeddings::default()), &index);
    assert!(indexer
        .index_directory(Path::new("/nonexistent/knowledge"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_index_file_and_check_file() {
    let dir = knowledge_dir();
    let index = Arc::new(InMemoryVectorIndex::new("kb"));
    let indexer = indexer_with(Arc::new(MockEmbeddings::default()), &index);

    let before = indexer.check_file("hygiene.txt").await.unwrap();
    assert!(!before.is_indexed());
    assert_eq!(before.sample, None);

    let report = indexer
        .index_file(&dir.path().join("hygiene.txt"))
        .await
        .unwrap();
    assert_eq!(report.files, 1);
    assert_eq!(report.upserted, 1);

    let after = indexer.check_file("hygiene.txt").await.unwrap();
    assert!(after.is_indexed());
    assert_eq!(after.matches, 1);
    assert_eq!(after.sample.as_deref(), Some("Autoclave handpieces."));
    assert!(!indexer.check_file("billing.txt").await.unwrap().is_indexed());
}

#[tokio::test]
async fn test_index_file_requires_existing_index() {
    let dir = knowledge_dir();
    let index = Arc::new(InMemoryVectorIndex::new("kb"));
    index.delete_index().await.unwrap();
    let indexer = indexer_with(Arc::new(MockEmbeddings::default()), &index);

    let result = indexer.index_file(&dir.path().join("hygiene.txt")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_ensure_and_recreate_index() {
    let dir = knowledge_dir();
    let index = Arc::new(InMemoryVectorIndex::new("kb"));
    let indexer = indexer_with(Arc::new(MockEmbeddings::default()), &index);

    assert!(!indexer.ensure_index().await.unwrap());
    indexer.index_directory(dir.path()).await.unwrap();
    assert!(!index.is_empty().await);

    indexer.recreate_index().await.unwrap();
    assert!(index.is_empty().await);
    let description = index.describe_index().await.unwrap().unwrap();
    assert_eq!(description.dimension, MOCK_DIMENSION);

    index.delete_index().await.unwrap();
    assert!(indexer.ensure_index().await.unwrap());
    assert!(index.describe_index().await.unwrap().is_some());
}
