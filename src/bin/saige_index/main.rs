// ABOUTME: Saige knowledge base maintenance CLI
// ABOUTME: Embeds text files into the vector index and manages the index lifecycle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence
//!
//! Usage:
//! ```bash
//! # Create the index when missing, then embed every .txt file
//! saige-index embed-all --dir ./knowledge
//!
//! # Embed a single file into an existing index
//! saige-index add-file billing-procedures.txt
//!
//! # Drop and recreate the index
//! saige-index recreate-index
//!
//! # Check whether a file has vectors in the index
//! saige-index check-file billing-procedures.txt
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use saige_server::config::environment::IndexerConfig;
use saige_server::logging::LoggingConfig;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "saige-index",
    about = "Saige knowledge base indexing tool",
    long_about = "Chunks knowledge base text files, embeds them, and maintains the vector index."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[non_exhaustive]
#[derive(Subcommand)]
enum Command {
    /// Ensure the index exists, then embed every .txt file in the directory
    EmbedAll {
        /// Knowledge base directory (defaults to KNOWLEDGE_BASE_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Embed one file into an existing index
    AddFile {
        /// File name inside the knowledge base directory
        name: String,

        /// Knowledge base directory (defaults to KNOWLEDGE_BASE_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Delete the index if present and create it again
    RecreateIndex,

    /// Report whether vectors exist for a file
    CheckFile {
        /// File name as stored in the `source` metadata
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::for_cli();
    if cli.verbose {
        "debug".clone_into(&mut logging.level);
    }
    logging.init()?;

    let config = IndexerConfig::from_env()?;
    info!(
        index = %config.vector_index.index_name,
        model = %config.openai.embedding_model,
        "Saige index tool"
    );
    let indexer = commands::build_indexer(&config)?;

    match cli.command {
        Command::EmbedAll { dir } => {
            let dir = dir.unwrap_or_else(|| config.knowledge_base_dir.clone());
            commands::embed_all(&indexer, &dir).await
        }
        Command::AddFile { name, dir } => {
            let dir = dir.unwrap_or_else(|| config.knowledge_base_dir.clone());
            commands::add_file(&indexer, &dir.join(name)).await
        }
        Command::RecreateIndex => commands::recreate_index(&indexer).await,
        Command::CheckFile { name } => commands::check_file(&indexer, &name).await,
    }
}
