// ABOUTME: Chat, message, vote, and context chunk record types
// ABOUTME: Serialized in camelCase to match the web client's JSON shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;

/// Who can read a chat besides its owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Owner only
    #[default]
    Private,
    /// Anyone holding the chat id
    Public,
}

impl Visibility {
    /// Database and wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            other => Err(AppError::invalid_input(format!(
                "Unknown visibility: {other}"
            ))),
        }
    }
}

/// Author of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Practice staff member
    User,
    /// Saige
    Assistant,
    /// Instructions injected by the server
    System,
}

impl MessageRole {
    /// Database and wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Map a client-supplied role, treating anything unknown as a user turn
    #[must_use]
    pub fn from_client_role(role: &str) -> Self {
        match role {
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::User,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(AppError::invalid_input(format!("Unknown message role: {other}"))),
        }
    }
}

/// A conversation owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Chat ID, chosen by the client on the first message
    pub id: String,
    /// Owning user (identity provider subject)
    pub user_id: String,
    /// Generated title
    pub title: String,
    /// Sharing setting
    pub visibility: Visibility,
    /// When the chat was created (RFC 3339)
    pub created_at: String,
}

impl Chat {
    /// Whether `user_id` may read this chat
    #[must_use]
    pub fn is_readable_by(&self, user_id: Option<&str>) -> bool {
        self.visibility == Visibility::Public || user_id == Some(self.user_id.as_str())
    }

    /// Whether `user_id` owns this chat
    #[must_use]
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// A single turn in a chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID
    pub id: String,
    /// Chat this message belongs to
    pub chat_id: String,
    /// Author role
    pub role: MessageRole,
    /// Plain text content
    pub content: String,
    /// Structured content parts (JSON array)
    pub parts: Value,
    /// File attachments (JSON array)
    pub attachments: Value,
    /// When the message was written (RFC 3339)
    pub created_at: String,
}

/// A thumbs up or down on an assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Vote ID
    pub id: String,
    /// Chat containing the message
    pub chat_id: String,
    /// Message voted on, unique across votes
    pub message_id: String,
    /// `true` for up, `false` for down
    pub is_upvoted: bool,
    /// When the vote was first cast (RFC 3339)
    pub created_at: String,
}

/// A knowledge base snippet returned by the vector index for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextChunk {
    /// Snippet text
    pub text: String,
    /// File the snippet was cut from
    pub source: String,
    /// Similarity score reported by the index
    pub relevance_score: f32,
}

/// Build the default `parts` array for a text-only message
#[must_use]
pub fn text_parts(text: &str) -> Value {
    serde_json::json!([{ "type": "text", "text": text }])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(visibility: Visibility) -> Chat {
        Chat {
            id: "chat-1".to_owned(),
            user_id: "user_a".to_owned(),
            title: "Insurance claims".to_owned(),
            visibility,
            created_at: "2025-01-01T00:00:00Z".to_owned(),
        }
    }

    #[test]
    fn test_private_chat_readable_by_owner_only() {
        let chat = chat(Visibility::Private);
        assert!(chat.is_readable_by(Some("user_a")));
        assert!(!chat.is_readable_by(Some("user_b")));
        assert!(!chat.is_readable_by(None));
    }

    #[test]
    fn test_public_chat_readable_by_anyone() {
        let chat = chat(Visibility::Public);
        assert!(chat.is_readable_by(Some("user_b")));
        assert!(chat.is_readable_by(None));
        assert!(!chat.is_owned_by("user_b"));
    }

    #[test]
    fn test_unknown_client_roles_become_user() {
        assert_eq!(MessageRole::from_client_role("assistant"), MessageRole::Assistant);
        assert_eq!(MessageRole::from_client_role("data"), MessageRole::User);
        assert_eq!(MessageRole::from_client_role("tool"), MessageRole::User);
    }

    #[test]
    fn test_visibility_parse() {
        assert_eq!("public".parse::<Visibility>().ok(), Some(Visibility::Public));
        assert!("shared".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_chat_serializes_camel_case() {
        let value = serde_json::to_value(chat(Visibility::Private)).unwrap_or_default();
        assert_eq!(value["userId"], "user_a");
        assert_eq!(value["visibility"], "private");
    }
}
