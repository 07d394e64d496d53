// ABOUTME: Health check route handlers for service monitoring
// ABOUTME: Liveness reports the process is up, readiness pings the database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! Health check routes for load balancers and orchestrators

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::warn;

use crate::constants::routes::{HEALTH, READY};
use crate::resources::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        async fn health_handler() -> Json<serde_json::Value> {
            Json(json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }))
        }

        async fn ready_handler(State(resources): State<Arc<ServerResources>>) -> Response {
            match resources.database.ping().await {
                Ok(()) => Json(json!({
                    "status": "ready",
                    "timestamp": chrono::Utc::now().to_rfc3339()
                }))
                .into_response(),
                Err(e) => {
                    warn!(error = %e, "Readiness check failed");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({
                            "status": "unavailable",
                            "timestamp": chrono::Utc::now().to_rfc3339()
                        })),
                    )
                        .into_response()
                }
            }
        }

        Router::new()
            .route(HEALTH, get(health_handler))
            .route(READY, get(ready_handler))
            .with_state(resources)
    }
}
