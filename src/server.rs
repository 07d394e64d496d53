// ABOUTME: Router assembly and HTTP serving for the Saige API
// ABOUTME: Merges domain routes, applies tracing, request-id, CORS, and body limits, and serves with graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::middleware::{make_request_span, setup_cors, MakeSaigeRequestId, REQUEST_ID_HEADER};
use crate::resources::ServerResources;
use crate::routes::{ChatRoutes, HealthRoutes, HistoryRoutes, VoteRoutes};

/// Largest accepted request body; chat requests carry the whole client history
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the application router with all middleware applied
pub fn build_router(resources: &Arc<ServerResources>, cors_origins: &[String]) -> Router {
    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(resources)))
        .merge(ChatRoutes::routes(Arc::clone(resources)))
        .merge(HistoryRoutes::routes(Arc::clone(resources)))
        .merge(VoteRoutes::routes(Arc::clone(resources)))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeSaigeRequestId))
        .layer(setup_cors(cors_origins))
}

/// Serve the API on `port` until SIGINT or SIGTERM
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails
pub async fn serve(
    resources: Arc<ServerResources>,
    port: u16,
    cors_origins: &[String],
) -> Result<()> {
    let app = build_router(&resources, cors_origins);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Saige server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Shutdown signal received, draining connections");
}
