// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory databases, session token minting, and server resources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used
)]
//! Shared test utilities for `saige_server`
//!
//! This module provides common test setup functions to reduce duplication
//! across integration tests.

use std::sync::{Arc, Once};

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use saige_server::{
    auth::{AuthManager, Claims},
    config::environment::ChatConfig,
    database::Database,
    llm::LlmProvider,
    models::{text_parts, Chat, Message, MessageRole},
    rag::ContextRetriever,
    resources::ServerResources,
};
use serde_json::json;

/// HS256 secret shared by the test auth manager and minted tokens
pub const TEST_JWT_SECRET: &[u8] = b"saige-integration-test-secret";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test database setup
pub async fn create_test_database() -> Result<Database> {
    init_test_logging();
    Ok(Database::new("sqlite::memory:").await?)
}

/// Auth manager accepting tokens from [`mint_token`]
pub fn create_test_auth_manager() -> AuthManager {
    AuthManager::from_secret(TEST_JWT_SECRET, None)
}

/// Mint a session token valid for one hour
pub fn mint_token(user_id: &str, email: Option<&str>) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_owned(),
        email: email.map(ToOwned::to_owned),
        iat: Some(now),
        exp: now + 3600,
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .unwrap()
}

/// `Authorization` header value for `user_id`
pub fn bearer(user_id: &str) -> String {
    format!("Bearer {}", mint_token(user_id, None))
}

/// Create test `ServerResources` around the given provider and retriever
pub async fn create_test_server_resources(
    llm: Arc<dyn LlmProvider>,
    retriever: ContextRetriever,
) -> Result<Arc<ServerResources>> {
    let database = create_test_database().await?;
    let resources = ServerResources::builder()
        .with_database(database)
        .with_auth_manager(create_test_auth_manager())
        .with_llm(llm)
        .with_retriever(retriever)
        .with_chat_config(ChatConfig::default())
        .build()?;
    Ok(Arc::new(resources))
}

/// Create a chat owned by `user_id`
pub async fn create_test_chat(database: &Database, chat_id: &str, user_id: &str) -> Result<Chat> {
    Ok(database
        .chats()
        .save_chat(chat_id, user_id, None, "Sterilization schedule")
        .await?)
}

/// Append a text message to a chat
pub async fn create_test_message(
    database: &Database,
    chat_id: &str,
    role: MessageRole,
    content: &str,
) -> Result<Message> {
    let id = uuid::Uuid::new_v4().to_string();
    let parts = text_parts(content);
    let attachments = json!([]);
    Ok(database
        .chats()
        .save_message(&saige_server::database::NewMessage {
            id: &id,
            chat_id,
            role,
            content,
            parts: &parts,
            attachments: &attachments,
        })
        .await?)
}
