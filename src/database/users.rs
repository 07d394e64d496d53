// ABOUTME: User records keyed by the identity provider subject
// ABOUTME: Users are created lazily the first time they start a chat
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{now_timestamp, Database};
use crate::errors::{AppError, AppResult};

/// Stored user row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Identity provider subject
    pub id: String,
    /// Email from the token, or a placeholder
    pub email: String,
    /// First time the user was seen (RFC 3339)
    pub created_at: String,
}

/// Placeholder email for users whose token carries none
fn placeholder_email(user_id: &str) -> String {
    format!("user-{user_id}@example.com")
}

/// Insert the user if missing, leaving an existing row untouched
pub(super) async fn upsert_user(
    conn: &mut SqliteConnection,
    user_id: &str,
    email: Option<&str>,
) -> Result<(), sqlx::Error> {
    let email = email.map_or_else(|| placeholder_email(user_id), ToOwned::to_owned);
    sqlx::query(
        r"
        INSERT INTO users (id, email, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT(id) DO NOTHING
        ",
    )
    .bind(user_id)
    .bind(email)
    .bind(now_timestamp())
    .execute(conn)
    .await?;
    Ok(())
}

/// User lookups and lazy creation
pub struct UserManager {
    pool: SqlitePool,
}

impl UserManager {
    /// Create a new user manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Make sure a row exists for `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails
    pub async fn ensure_user(&self, user_id: &str, email: Option<&str>) -> AppResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;
        upsert_user(&mut conn, user_id, email)
            .await
            .map_err(|e| AppError::database(format!("Failed to upsert user: {e}")))
    }

    /// Get a user by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_user(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, email, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;

        Ok(row.map(|r| UserRecord {
            id: r.get("id"),
            email: r.get("email"),
            created_at: r.get("created_at"),
        }))
    }
}

impl Database {
    pub(super) async fn migrate_users(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
