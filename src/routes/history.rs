// ABOUTME: Chat history route listing the caller's chats
// ABOUTME: Returns chats newest first for the sidebar
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
use tracing::debug;

use crate::constants::routes::HISTORY;
use crate::errors::AppError;
use crate::middleware::authenticate_request;
use crate::models::Chat;
use crate::resources::ServerResources;

/// Chat history routes
pub struct HistoryRoutes;

impl HistoryRoutes {
    /// Create history routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(HISTORY, get(Self::list_history))
            .with_state(resources)
    }

    async fn list_history(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<Vec<Chat>>, AppError> {
        let auth = authenticate_request(&resources.auth_manager, &headers)
            .map_err(|_| AppError::permission_denied("Unauthorized!"))?;

        let chats = resources
            .database
            .chats()
            .list_chats_by_user(&auth.user_id)
            .await?;
        debug!(user_id = %auth.user_id, count = chats.len(), "Listed chat history");

        Ok(Json(chats))
    }
}
