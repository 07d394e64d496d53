// ABOUTME: Application constants grouped by domain for the Saige server
// ABOUTME: Retrieval, completion, indexing, and network defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! Constants module
//!
//! Defaults used when the corresponding environment variable is not set.

/// Network ports
pub mod ports {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
}

/// API route paths
pub mod routes {
    /// Chat relay and deletion
    pub const CHAT: &str = "/api/chat";
    /// Chat history listing
    pub const HISTORY: &str = "/api/history";
    /// Message votes
    pub const VOTE: &str = "/api/vote";
    /// Liveness probe
    pub const HEALTH: &str = "/health";
    /// Readiness probe
    pub const READY: &str = "/ready";
}

/// Retrieval-augmented generation defaults
pub mod rag {
    /// Number of nearest neighbors requested from the vector index
    pub const DEFAULT_TOP_K: usize = 5;
    /// Number of trailing client messages forwarded to the completion API
    pub const DEFAULT_HISTORY_WINDOW: usize = 6;
    /// Separator placed between retrieved snippets in the context block
    pub const CONTEXT_SEPARATOR: &str = "\n\n";
}

/// Chat completion defaults
pub mod completion {
    /// Model used for assistant replies
    pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
    /// Sampling temperature for assistant replies
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;
    /// Model used to generate chat titles
    pub const DEFAULT_TITLE_MODEL: &str = "gpt-3.5-turbo";
    /// Sampling temperature for title generation
    pub const TITLE_TEMPERATURE: f32 = 0.7;
    /// Token cap for title generation
    pub const TITLE_MAX_TOKENS: u32 = 60;
    /// Longest title kept, in characters
    pub const TITLE_MAX_CHARS: usize = 80;
    /// Title used when generation fails
    pub const FALLBACK_TITLE: &str = "New Chat";
    /// Message streamed to the client when the completion fails mid-request
    pub const STREAM_ERROR_MESSAGE: &str = "Error generating response";
}

/// Embedding and vector index defaults
pub mod embeddings {
    /// Embedding model
    pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
    /// Vector dimension produced by the default model
    pub const DEFAULT_DIMENSION: usize = 1536;
    /// Similarity metric used when creating an index
    pub const DEFAULT_METRIC: &str = "cosine";
}

/// Offline indexing defaults
pub mod indexing {
    /// Characters per chunk
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;
    /// Characters shared between consecutive chunks
    pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
    /// Texts per embeddings request and vectors per upsert request
    pub const BATCH_SIZE: usize = 100;
    /// Length of the random suffix appended to vector ids
    pub const VECTOR_ID_SUFFIX_LEN: usize = 10;
    /// Extension of files picked up from the knowledge directory
    pub const KNOWLEDGE_FILE_EXTENSION: &str = "txt";
    /// Default knowledge directory
    pub const DEFAULT_KNOWLEDGE_DIR: &str = "./knowledge";
}

/// Timeout configurations
pub mod timeouts {
    /// Connect timeout for hosted API clients, in seconds
    pub const API_CLIENT_CONNECT_TIMEOUT_SECS: u64 = 10;
    /// Request timeout for hosted API clients, in seconds
    pub const API_CLIENT_TIMEOUT_SECS: u64 = 120;
    /// Database connection timeout in seconds
    pub const DATABASE_TIMEOUT_SECS: u64 = 10;
}
