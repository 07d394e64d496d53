// ABOUTME: Vote route handlers for thumbs up/down feedback on assistant messages
// ABOUTME: Lists votes by chat or message ids and upserts one vote per message
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::constants::routes::VOTE;
use crate::errors::{AppError, AppResult};
use crate::middleware::authenticate_request;
use crate::models::{Chat, Vote};
use crate::resources::ServerResources;
use crate::routes::ApiJson;

/// Query of `GET /api/vote`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteQuery {
    /// Votes in one chat
    pub chat_id: Option<String>,
    /// Comma-separated message IDs
    pub message_ids: Option<String>,
}

/// Body of `PATCH /api/vote`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    /// Chat containing the message
    pub chat_id: Option<String>,
    /// Message voted on
    pub message_id: Option<String>,
    /// `true` for up, `false` for down
    pub is_upvoted: Option<bool>,
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Vote routes
pub struct VoteRoutes;

impl VoteRoutes {
    /// Create vote routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(VOTE, get(Self::get_votes).patch(Self::vote))
            .with_state(resources)
    }

    async fn owned_chat(
        resources: &ServerResources,
        chat_id: &str,
        user_id: &str,
    ) -> AppResult<Chat> {
        let chat = resources
            .database
            .chats()
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| AppError::not_found("Chat"))?;
        if !chat.is_owned_by(user_id) {
            return Err(AppError::permission_denied("Unauthorized"));
        }
        Ok(chat)
    }

    async fn get_votes(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<VoteQuery>,
    ) -> Result<Json<Vec<Vote>>, AppError> {
        let chat_id = non_empty(query.chat_id);
        let message_ids = non_empty(query.message_ids);
        if chat_id.is_none() && message_ids.is_none() {
            return Err(AppError::invalid_input("chatId or messageIds is required"));
        }

        let auth = authenticate_request(&resources.auth_manager, &headers)
            .map_err(|_| AppError::permission_denied("Unauthorized"))?;
        let votes = resources.database.votes();

        if let Some(chat_id) = chat_id {
            let chat = Self::owned_chat(&resources, &chat_id, &auth.user_id).await?;
            return Ok(Json(votes.get_votes_by_chat(&chat.id).await?));
        }

        let ids = message_ids.as_deref().map(split_ids).unwrap_or_default();
        Ok(Json(votes.get_votes_by_message_ids(&ids, &auth.user_id).await?))
    }

    async fn vote(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        ApiJson(request): ApiJson<VoteRequest>,
    ) -> Result<Response, AppError> {
        let (Some(chat_id), Some(message_id), Some(is_upvoted)) = (
            non_empty(request.chat_id),
            non_empty(request.message_id),
            request.is_upvoted,
        ) else {
            return Err(AppError::invalid_input(
                "messageId and isUpvoted are required",
            ));
        };

        let auth = authenticate_request(&resources.auth_manager, &headers)
            .map_err(|_| AppError::permission_denied("Unauthorized"))?;
        let chat = Self::owned_chat(&resources, &chat_id, &auth.user_id).await?;

        let in_chat = resources
            .database
            .chats()
            .get_message_by_id(&message_id)
            .await?
            .is_some_and(|message| message.chat_id == chat.id);
        if !in_chat {
            return Err(AppError::not_found("Message"));
        }

        resources
            .database
            .votes()
            .vote_message(&chat.id, &message_id, is_upvoted)
            .await?;
        info!(chat_id = %chat.id, message_id = %message_id, is_upvoted, "Recorded vote");

        Ok((StatusCode::OK, "Message voted").into_response())
    }
}
