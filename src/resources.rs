// ABOUTME: Shared server resources injected into every route handler
// ABOUTME: Holds the database, token verifier, completion provider, and context retriever
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::AuthManager;
use crate::config::environment::{ChatConfig, ServerConfig};
use crate::database::Database;
use crate::embeddings::{EmbeddingProvider, OpenAiEmbeddings};
use crate::errors::{AppError, AppResult};
use crate::llm::{LlmProvider, OpenAiProvider, OpenAiProviderConfig};
use crate::rag::ContextRetriever;
use crate::vector::{InMemoryVectorIndex, PineconeIndex, VectorIndex};

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// Chat, message, and vote storage
    pub database: Arc<Database>,
    /// Session token verification
    pub auth_manager: Arc<AuthManager>,
    /// Chat completion provider
    pub llm: Arc<dyn LlmProvider>,
    /// Knowledge base retrieval
    pub retriever: Arc<ContextRetriever>,
    /// Model, temperature, and window settings
    pub chat: Arc<ChatConfig>,
}

impl ServerResources {
    /// Assemble resources from already-built parts
    #[must_use]
    pub fn new(
        database: Database,
        auth_manager: AuthManager,
        llm: Arc<dyn LlmProvider>,
        retriever: ContextRetriever,
        chat: ChatConfig,
    ) -> Self {
        Self {
            database: Arc::new(database),
            auth_manager: Arc::new(auth_manager),
            llm,
            retriever: Arc::new(retriever),
            chat: Arc::new(chat),
        }
    }

    /// Build production resources from configuration
    ///
    /// Without `PINECONE_API_KEY` an empty in-memory index is used, so every
    /// answer is generated without knowledge base context.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, no token key is
    /// configured, or an HTTP client cannot be built
    pub async fn from_config(config: &ServerConfig) -> AppResult<Self> {
        let database = Database::new(&config.database_url.to_connection_string()).await?;
        let auth_manager = AuthManager::from_config(&config.auth)?;

        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
            OpenAiProviderConfig::from_config(&config.openai, &config.chat.chat_model),
        )?);
        info!(
            provider = llm.name(),
            streaming = llm.capabilities().supports_streaming(),
            "Completion provider ready"
        );

        let embeddings: Arc<dyn EmbeddingProvider> =
            Arc::new(OpenAiEmbeddings::new(&config.openai)?);
        let index = vector_index_from_config(config)?;
        let retriever = ContextRetriever::new(embeddings, index, config.chat.top_k);

        Ok(Self::new(
            database,
            auth_manager,
            llm,
            retriever,
            config.chat.clone(),
        ))
    }

    /// Create a new builder for `ServerResources`
    #[must_use]
    pub fn builder() -> ServerResourcesBuilder {
        ServerResourcesBuilder::new()
    }
}

fn vector_index_from_config(config: &ServerConfig) -> AppResult<Arc<dyn VectorIndex>> {
    if config.vector_index.api_key.is_some() {
        Ok(Arc::new(PineconeIndex::new(&config.vector_index)?))
    } else {
        warn!("Using an empty in-memory vector index");
        Ok(Arc::new(InMemoryVectorIndex::new(
            config.vector_index.index_name.clone(),
        )))
    }
}

/// Builder for `ServerResources`, used where parts are substituted
pub struct ServerResourcesBuilder {
    database: Option<Database>,
    auth_manager: Option<AuthManager>,
    llm: Option<Arc<dyn LlmProvider>>,
    retriever: Option<ContextRetriever>,
    chat: ChatConfig,
}

impl Default for ServerResourcesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerResourcesBuilder {
    /// Create a builder with default chat settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            database: None,
            auth_manager: None,
            llm: None,
            retriever: None,
            chat: ChatConfig::default(),
        }
    }

    /// Set the database
    #[must_use]
    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    /// Set the auth manager
    #[must_use]
    pub fn with_auth_manager(mut self, auth_manager: AuthManager) -> Self {
        self.auth_manager = Some(auth_manager);
        self
    }

    /// Set the completion provider
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Set the context retriever
    #[must_use]
    pub fn with_retriever(mut self, retriever: ContextRetriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Set chat settings
    #[must_use]
    pub fn with_chat_config(mut self, chat: ChatConfig) -> Self {
        self.chat = chat;
        self
    }

    /// Build the `ServerResources`
    ///
    /// # Errors
    ///
    /// Returns an error if any required part is missing
    pub fn build(self) -> AppResult<ServerResources> {
        let database = self
            .database
            .ok_or_else(|| AppError::config("Database is required"))?;
        let auth_manager = self
            .auth_manager
            .ok_or_else(|| AppError::config("AuthManager is required"))?;
        let llm = self
            .llm
            .ok_or_else(|| AppError::config("LLM provider is required"))?;
        let retriever = self
            .retriever
            .ok_or_else(|| AppError::config("Context retriever is required"))?;

        Ok(ServerResources::new(
            database,
            auth_manager,
            llm,
            retriever,
            self.chat,
        ))
    }
}
