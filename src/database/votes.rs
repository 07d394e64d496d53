// ABOUTME: Database operations for message votes
// ABOUTME: One vote per message, overwritten in place when the user changes their mind
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::now_timestamp;
use crate::errors::{AppError, AppResult};
use crate::models::Vote;

fn row_to_vote(row: &SqliteRow) -> Vote {
    Vote {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        message_id: row.get("message_id"),
        is_upvoted: row.get("is_upvoted"),
        created_at: row.get("created_at"),
    }
}

/// Vote database operations manager
pub struct VoteManager {
    pool: SqlitePool,
}

impl VoteManager {
    /// Create a new vote manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a vote, replacing any earlier vote on the same message
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn vote_message(
        &self,
        chat_id: &str,
        message_id: &str,
        is_upvoted: bool,
    ) -> AppResult<Vote> {
        let row = sqlx::query(
            r"
            INSERT INTO votes (id, chat_id, message_id, is_upvoted, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(message_id) DO UPDATE SET is_upvoted = excluded.is_upvoted
            RETURNING id, chat_id, message_id, is_upvoted, created_at
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(chat_id)
        .bind(message_id)
        .bind(is_upvoted)
        .bind(now_timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save vote: {e}")))?;

        Ok(row_to_vote(&row))
    }

    /// All votes cast in a chat
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn get_votes_by_chat(&self, chat_id: &str) -> AppResult<Vec<Vote>> {
        let rows = sqlx::query(
            r"
            SELECT id, chat_id, message_id, is_upvoted, created_at
            FROM votes
            WHERE chat_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get votes: {e}")))?;

        Ok(rows.iter().map(row_to_vote).collect())
    }

    /// Votes on the given messages, limited to chats owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn get_votes_by_message_ids(
        &self,
        message_ids: &[String],
        user_id: &str,
    ) -> AppResult<Vec<Vote>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r"
            SELECT v.id, v.chat_id, v.message_id, v.is_upvoted, v.created_at
            FROM votes v
            JOIN chats c ON c.id = v.chat_id
            WHERE c.user_id = ",
        );
        builder.push_bind(user_id);
        builder.push(" AND v.message_id IN (");
        let mut separated = builder.separated(", ");
        for id in message_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") ORDER BY v.created_at ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get votes: {e}")))?;

        Ok(rows.iter().map(row_to_vote).collect())
    }
}
