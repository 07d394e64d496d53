// ABOUTME: Saige API server binary
// ABOUTME: Loads configuration, opens the database, wires providers, and serves the HTTP API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # Saige Server Binary
//!
//! Starts the chat relay API backed by SQLite, the completion and embedding
//! APIs, and the knowledge base vector index.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use saige_server::{
    config::environment::ServerConfig, logging, resources::ServerResources, server,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "saige-server")]
#[command(about = "Saige - knowledge-base grounded assistant API for dental practice staff")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    info!("Starting Saige server");
    info!("{}", config.summary());

    let resources = Arc::new(ServerResources::from_config(&config).await?);
    info!(
        database = %config.database_url,
        top_k = resources.retriever.top_k(),
        "Server resources initialized"
    );

    if let Err(e) = server::serve(resources, config.http_port, &config.cors_origins).await {
        error!("Server error: {e:#}");
        return Err(e);
    }

    Ok(())
}
