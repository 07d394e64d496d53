// ABOUTME: Database operations for chats and their messages
// ABOUTME: Handles chat ownership, visibility, message history, and trailing-message deletion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{now_timestamp, users};
use crate::errors::{AppError, AppResult};
use crate::models::{Chat, Message, MessageRole, Visibility};

// ============================================================================
// Inputs
// ============================================================================

/// A message to persist
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    /// Client- or server-generated message ID
    pub id: &'a str,
    /// Chat the message belongs to
    pub chat_id: &'a str,
    /// Author role
    pub role: MessageRole,
    /// Plain text content
    pub content: &'a str,
    /// Structured parts (JSON array)
    pub parts: &'a Value,
    /// Attachments (JSON array)
    pub attachments: &'a Value,
}

// ============================================================================
// Row Mapping
// ============================================================================

fn row_to_chat(row: &SqliteRow) -> AppResult<Chat> {
    let visibility: String = row.get("visibility");
    Ok(Chat {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        visibility: visibility.parse()?,
        created_at: row.get("created_at"),
    })
}

fn row_to_message(row: &SqliteRow) -> AppResult<Message> {
    let role: String = row.get("role");
    let parts: String = row.get("parts");
    let attachments: String = row.get("attachments");
    Ok(Message {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        role: role.parse()?,
        content: row.get("content"),
        parts: serde_json::from_str(&parts)?,
        attachments: serde_json::from_str(&attachments)?,
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// Chat Manager
// ============================================================================

/// Chat database operations manager
pub struct ChatManager {
    pool: SqlitePool,
}

impl ChatManager {
    /// Create a new chat manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Chat Operations
    // ========================================================================

    /// Get a chat by ID regardless of owner
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn get_chat(&self, chat_id: &str) -> AppResult<Option<Chat>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, visibility, created_at
            FROM chats
            WHERE id = $1
            ",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get chat: {e}")))?;

        row.as_ref().map(row_to_chat).transpose()
    }

    /// Create a chat, creating the owning user first if needed
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails or the chat ID is taken
    pub async fn save_chat(
        &self,
        chat_id: &str,
        user_id: &str,
        user_email: Option<&str>,
        title: &str,
    ) -> AppResult<Chat> {
        let now = now_timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        users::upsert_user(&mut *tx, user_id, user_email)
            .await
            .map_err(|e| AppError::database(format!("Failed to upsert user: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO chats (id, user_id, title, visibility, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(title)
        .bind(Visibility::Private.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to save chat: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit chat: {e}")))?;

        Ok(Chat {
            id: chat_id.to_owned(),
            user_id: user_id.to_owned(),
            title: title.to_owned(),
            visibility: Visibility::Private,
            created_at: now,
        })
    }

    /// List a user's chats, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn list_chats_by_user(&self, user_id: &str) -> AppResult<Vec<Chat>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, visibility, created_at
            FROM chats
            WHERE user_id = $1
            ORDER BY created_at DESC, rowid DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list chats: {e}")))?;

        rows.iter().map(row_to_chat).collect()
    }

    /// Delete a chat; messages and votes go with it
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn delete_chat(&self, chat_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM chats WHERE id = $1")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete chat: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Change who can read a chat
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn update_visibility(&self, chat_id: &str, visibility: Visibility) -> AppResult<bool> {
        let result = sqlx::query("UPDATE chats SET visibility = $1 WHERE id = $2")
            .bind(visibility.as_str())
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update chat visibility: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Persist a message
    ///
    /// A message whose ID already exists is left as stored, so a client
    /// re-sending its history does not duplicate rows.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn save_message(&self, message: &NewMessage<'_>) -> AppResult<Message> {
        let now = now_timestamp();
        let parts = serde_json::to_string(message.parts)?;
        let attachments = serde_json::to_string(message.attachments)?;

        sqlx::query(
            r"
            INSERT INTO messages (id, chat_id, role, content, parts, attachments, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(message.role.as_str())
        .bind(message.content)
        .bind(&parts)
        .bind(&attachments)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save message: {e}")))?;

        Ok(Message {
            id: message.id.to_owned(),
            chat_id: message.chat_id.to_owned(),
            role: message.role,
            content: message.content.to_owned(),
            parts: message.parts.clone(),
            attachments: message.attachments.clone(),
            created_at: now,
        })
    }

    /// Get all messages for a chat in chronological order
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn get_messages(&self, chat_id: &str) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            r"
            SELECT id, chat_id, role, content, parts, attachments, created_at
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at ASC, rowid ASC
            ",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get messages: {e}")))?;

        rows.iter().map(row_to_message).collect()
    }

    /// Get a single message by ID
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn get_message_by_id(&self, message_id: &str) -> AppResult<Option<Message>> {
        let row = sqlx::query(
            r"
            SELECT id, chat_id, role, content, parts, attachments, created_at
            FROM messages
            WHERE id = $1
            ",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get message: {e}")))?;

        row.as_ref().map(row_to_message).transpose()
    }

    /// Get message count for a chat
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn get_message_count(&self, chat_id: &str) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM messages WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count messages: {e}")))?;

        Ok(row.get("count"))
    }

    /// Delete every message in a chat created at or after `timestamp`
    ///
    /// Votes on the deleted messages are removed by the foreign key cascade.
    /// Returns the number of deleted messages.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn delete_messages_after(&self, chat_id: &str, timestamp: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE chat_id = $1 AND created_at >= $2")
            .bind(chat_id)
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete trailing messages: {e}")))?;

        Ok(result.rows_affected())
    }
}
