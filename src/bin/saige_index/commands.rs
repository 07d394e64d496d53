// ABOUTME: Subcommand implementations for the saige-index CLI
// ABOUTME: Builds the indexer from configuration and prints run summaries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use saige_server::config::environment::IndexerConfig;
use saige_server::embeddings::OpenAiEmbeddings;
use saige_server::indexing::{IndexingReport, KnowledgeBaseIndexer, TextChunker};
use saige_server::vector::PineconeIndex;

/// Wire the hosted embedding API and vector index into an indexer
pub fn build_indexer(config: &IndexerConfig) -> Result<KnowledgeBaseIndexer> {
    let embeddings = Arc::new(OpenAiEmbeddings::new(&config.openai)?);
    let index = Arc::new(PineconeIndex::new(&config.vector_index)?);
    let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
    Ok(KnowledgeBaseIndexer::new(
        embeddings,
        index,
        chunker,
        config.vector_index.dimension,
    ))
}

fn print_report(report: &IndexingReport) {
    println!("Files indexed:    {}", report.files);
    if report.failed_files > 0 {
        println!("Files skipped:    {}", report.failed_files);
    }
    println!("Chunks embedded:  {}", report.chunks);
    println!("Vectors upserted: {}", report.upserted);
    if report.failed_batches > 0 {
        println!("Failed batches:   {}", report.failed_batches);
    }
}

pub async fn embed_all(indexer: &KnowledgeBaseIndexer, dir: &Path) -> Result<()> {
    if indexer.ensure_index().await? {
        println!("Created vector index");
    }
    let report = indexer.index_directory(dir).await?;
    print_report(&report);
    Ok(())
}

pub async fn add_file(indexer: &KnowledgeBaseIndexer, path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("File not found: {}", path.display());
    }
    let report = indexer.index_file(path).await?;
    print_report(&report);
    Ok(())
}

pub async fn recreate_index(indexer: &KnowledgeBaseIndexer) -> Result<()> {
    indexer.recreate_index().await?;
    println!("Vector index recreated; run embed-all to repopulate it");
    Ok(())
}

pub async fn check_file(indexer: &KnowledgeBaseIndexer, name: &str) -> Result<()> {
    let check = indexer.check_file(name).await?;
    if check.is_indexed() {
        println!("{name} is indexed ({} vectors found)", check.matches);
        if let Some(sample) = check.sample {
            println!("Sample:\n{sample}");
        }
    } else {
        println!("{name} is not indexed");
    }
    Ok(())
}
