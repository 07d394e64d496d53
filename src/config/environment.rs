// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses ports, database URL, auth keys, hosted API settings, and RAG parameters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! Environment-based configuration management

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};
use url::Url;

use crate::constants::{completion, embeddings, indexing, ports, rag};

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Deployed service
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string, treating bare paths as `SQLite` files
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        let path_str = s.strip_prefix("sqlite:").unwrap_or(s);
        if path_str == ":memory:" {
            Self::Memory
        } else {
            Self::SQLite {
                path: PathBuf::from(path_str.trim_start_matches("//")),
            }
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/saige.db"),
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Identity-provider token validation settings
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Shared HS256 secret (development and tests)
    pub jwt_secret: Option<String>,
    /// PEM-encoded RS256 public key published by the identity provider
    pub jwt_public_key_pem: Option<String>,
    /// Expected `iss` claim, when set
    pub issuer: Option<String>,
}

/// `OpenAI` API settings for completions and embeddings
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: Option<String>,
    /// Base URL, including the `/v1` suffix
    pub base_url: String,
    /// Embedding model
    pub embedding_model: String,
}

/// Managed vector index settings
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// API key
    pub api_key: Option<String>,
    /// Index name
    pub index_name: String,
    /// Data-plane host of the index; resolved from the control plane when unset
    pub index_host: Option<String>,
    /// Control-plane base URL
    pub controller_url: String,
    /// Optional namespace inside the index
    pub namespace: Option<String>,
    /// Vector dimension used when creating the index
    pub dimension: usize,
}

impl OpenAiConfig {
    /// Load from `OPENAI_*` and `SAIGE_EMBEDDING_MODEL`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: optional_env("OPENAI_API_KEY"),
            base_url: env_var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            embedding_model: env_var_or("SAIGE_EMBEDDING_MODEL", embeddings::DEFAULT_EMBEDDING_MODEL),
        }
    }
}

impl VectorIndexConfig {
    /// Load from `PINECONE_*`
    ///
    /// # Errors
    ///
    /// Returns an error if `PINECONE_DIMENSION` is not a number
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: optional_env("PINECONE_API_KEY"),
            index_name: env_var_or("PINECONE_INDEX_NAME", "saige-knowledge"),
            index_host: optional_env("PINECONE_INDEX_HOST"),
            controller_url: env_var_or("PINECONE_CONTROLLER_URL", "https://api.pinecone.io"),
            namespace: optional_env("PINECONE_NAMESPACE"),
            dimension: parse_env("PINECONE_DIMENSION", embeddings::DEFAULT_DIMENSION)?,
        })
    }
}

/// Chat relay tuning
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Model used for assistant replies
    pub chat_model: String,
    /// Model used for title generation
    pub title_model: String,
    /// Sampling temperature for assistant replies
    pub temperature: f32,
    /// Trailing client messages forwarded to the completion API
    pub history_window: usize,
    /// Knowledge base snippets retrieved per request
    pub top_k: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            chat_model: completion::DEFAULT_CHAT_MODEL.to_owned(),
            title_model: completion::DEFAULT_TITLE_MODEL.to_owned(),
            temperature: completion::DEFAULT_TEMPERATURE,
            history_window: rag::DEFAULT_HISTORY_WINDOW,
            top_k: rag::DEFAULT_TOP_K,
        }
    }
}

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Database configuration
    pub database_url: DatabaseUrl,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// `OpenAI` configuration
    pub openai: OpenAiConfig,
    /// Vector index configuration
    pub vector_index: VectorIndexConfig,
    /// Chat relay configuration
    pub chat: ChatConfig,
    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,
    /// Directory of knowledge base text files
    pub knowledge_base_dir: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed or a URL is invalid
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Self {
            http_port: parse_env("HTTP_PORT", ports::DEFAULT_HTTP_PORT)?,
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )),
            database_url: DatabaseUrl::parse_url(&env_var_or(
                "DATABASE_URL",
                &DatabaseUrl::default().to_connection_string(),
            )),
            auth: AuthConfig {
                jwt_secret: optional_env("AUTH_JWT_SECRET"),
                jwt_public_key_pem: optional_env("AUTH_JWT_PUBLIC_KEY"),
                issuer: optional_env("AUTH_JWT_ISSUER"),
            },
            openai: OpenAiConfig::from_env(),
            vector_index: VectorIndexConfig::from_env()?,
            chat: ChatConfig {
                chat_model: env_var_or("SAIGE_CHAT_MODEL", completion::DEFAULT_CHAT_MODEL),
                title_model: env_var_or("SAIGE_TITLE_MODEL", completion::DEFAULT_TITLE_MODEL),
                temperature: parse_env("SAIGE_TEMPERATURE", completion::DEFAULT_TEMPERATURE)?,
                history_window: parse_env("SAIGE_HISTORY_WINDOW", rag::DEFAULT_HISTORY_WINDOW)?,
                top_k: parse_env("SAIGE_RAG_TOP_K", rag::DEFAULT_TOP_K)?,
            },
            cors_origins: parse_origins(&env_var_or("CORS_ALLOWED_ORIGINS", "*")),
            knowledge_base_dir: knowledge_base_dir_from_env(),
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error for values that would make every request fail
    pub fn validate(&self) -> Result<()> {
        if self.chat.top_k == 0 {
            return Err(anyhow!("SAIGE_RAG_TOP_K must be at least 1"));
        }
        if self.chat.history_window == 0 {
            return Err(anyhow!("SAIGE_HISTORY_WINDOW must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(anyhow!("SAIGE_TEMPERATURE must be between 0 and 2"));
        }
        Url::parse(&self.openai.base_url).context("Invalid OPENAI_BASE_URL")?;
        Url::parse(&self.vector_index.controller_url).context("Invalid PINECONE_CONTROLLER_URL")?;

        if self.auth.jwt_secret.is_none() && self.auth.jwt_public_key_pem.is_none() {
            return Err(anyhow!(
                "Either AUTH_JWT_PUBLIC_KEY or AUTH_JWT_SECRET must be set"
            ));
        }
        if self.openai.api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; completions and embeddings will fail");
        }
        if self.vector_index.api_key.is_none() {
            warn!("PINECONE_API_KEY is not set; context retrieval will return no snippets");
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Saige Server Configuration:\n\
             - HTTP Port: {}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - Chat Model: {} (temperature {})\n\
             - Embedding Model: {}\n\
             - Vector Index: {} (top-k {})\n\
             - History Window: {}\n\
             - Auth: {}",
            self.http_port,
            self.environment,
            self.database_url,
            self.chat.chat_model,
            self.chat.temperature,
            self.openai.embedding_model,
            self.vector_index.index_name,
            self.chat.top_k,
            self.chat.history_window,
            if self.auth.jwt_public_key_pem.is_some() {
                "RS256 public key"
            } else if self.auth.jwt_secret.is_some() {
                "HS256 shared secret"
            } else {
                "Not configured"
            },
        )
    }
}

/// Settings for the offline `saige-index` tool
///
/// Unlike [`ServerConfig`] no token key is needed, but both hosted APIs are.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// `OpenAI` configuration for embeddings
    pub openai: OpenAiConfig,
    /// Vector index configuration
    pub vector_index: VectorIndexConfig,
    /// Directory of knowledge base text files
    pub knowledge_base_dir: PathBuf,
    /// Characters per chunk
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl IndexerConfig {
    /// Load indexing configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an API key is missing or a number cannot be parsed
    pub fn from_env() -> Result<Self> {
        let config = Self {
            openai: OpenAiConfig::from_env(),
            vector_index: VectorIndexConfig::from_env()?,
            knowledge_base_dir: knowledge_base_dir_from_env(),
            chunk_size: parse_env("SAIGE_CHUNK_SIZE", indexing::DEFAULT_CHUNK_SIZE)?,
            chunk_overlap: parse_env("SAIGE_CHUNK_OVERLAP", indexing::DEFAULT_CHUNK_OVERLAP)?,
        };

        if config.openai.api_key.is_none() {
            return Err(anyhow!("OPENAI_API_KEY must be set to embed documents"));
        }
        if config.vector_index.api_key.is_none() {
            return Err(anyhow!("PINECONE_API_KEY must be set to manage the index"));
        }
        Url::parse(&config.openai.base_url).context("Invalid OPENAI_BASE_URL")?;
        Ok(config)
    }
}

fn knowledge_base_dir_from_env() -> PathBuf {
    PathBuf::from(env_var_or("KNOWLEDGE_BASE_DIR", indexing::DEFAULT_KNOWLEDGE_DIR))
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Get a non-empty environment variable
fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}")),
        Err(_) => Ok(default),
    }
}

/// Parse comma-separated origins
fn parse_origins(origins: &str) -> Vec<String> {
    origins
        .split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}
