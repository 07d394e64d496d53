// ABOUTME: Main library entry point for the Saige knowledge-base chat server
// ABOUTME: Provides the RAG chat relay, chat/vote persistence, and offline indexing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # Saige Server
//!
//! Backend for Saige, an assistant that answers dental-practice operations
//! questions from a private knowledge base.
//!
//! ## Request path
//!
//! `POST /api/chat` embeds the latest user turn, asks the vector index for the
//! nearest knowledge base snippets, renders them into the system prompt, and
//! relays a streamed completion back to the browser over server-sent events.
//! The user turn and the final assistant reply are persisted in SQLite.
//!
//! ## Architecture
//!
//! - **Auth**: validation of identity-provider session tokens
//! - **Database**: chats, messages, and votes
//! - **LLM / Embeddings / Vector**: clients for hosted APIs behind async traits
//! - **RAG**: context retrieval and system prompt rendering
//! - **Indexing**: chunking and batch upsert of knowledge base files
//! - **Routes**: axum handlers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use saige_server::config::environment::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Saige configured with HTTP port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Identity-provider token validation
pub mod auth;

/// Configuration management
pub mod config;

/// SQLite persistence for users, chats, messages, and votes
pub mod database;

/// Embedding API clients
pub mod embeddings;

/// Unified error handling re-exported from `saige-core`
pub mod errors;

/// Knowledge base chunking and vector upsert
pub mod indexing;

/// Chat completion providers and SSE stream parsing
pub mod llm;

/// Structured logging setup
pub mod logging;

/// HTTP middleware (auth extraction, CORS, request tracing)
pub mod middleware;

/// Context retrieval and system prompt rendering
pub mod rag;

/// Shared server state
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// Router assembly and HTTP serving
pub mod server;

/// Vector index clients
pub mod vector;

pub use saige_core::{constants, models};
