// ABOUTME: Integration tests for the assembled router and its middleware stack
// ABOUTME: Checks health probes, request ID propagation, body limits, and CORS headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::Router;
use helpers::axum_test::AxumTestRequest;
use helpers::fakes::{mock_retriever, seeded_index, MockLlmProvider};
use saige_server::server::build_router;
use serde_json::{json, Value};

async fn app(origins: &[String]) -> Router {
    let resources = common::create_test_server_resources(
        Arc::new(MockLlmProvider::new(&["ok"])),
        mock_retriever(seeded_index(&[]).await, 5),
    )
    .await
    .unwrap();
    build_router(&resources, origins)
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = app(&[]).await;

    let health: Value = AxumTestRequest::get("/health").send(app.clone()).await.json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    let ready = AxumTestRequest::get("/ready").send(app).await;
    assert_eq!(ready.status(), 200);
    let body: Value = ready.json();
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_request_id_generated_and_propagated() {
    let app = app(&[]).await;

    let generated = AxumTestRequest::get("/health").send(app.clone()).await;
    assert!(generated
        .header("x-request-id")
        .is_some_and(|id| id.starts_with("req_")));

    let supplied = AxumTestRequest::get("/health")
        .header("x-request-id", "req_from_client")
        .send(app)
        .await;
    assert_eq!(supplied.header("x-request-id").as_deref(), Some("req_from_client"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = AxumTestRequest::get("/api/unknown").send(app(&[]).await).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let huge = "x".repeat(3 * 1024 * 1024);
    let response = AxumTestRequest::post("/api/chat")
        .auth(&common::bearer("user_a"))
        .json(&json!({ "id": "chat-big", "messages": [{ "role": "user", "content": huge }] }))
        .send(app(&[]).await)
        .await;

    assert_eq!(response.status(), 413);
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let origins = vec!["https://app.saige.example".to_owned()];
    let response = AxumTestRequest::get("/health")
        .header("origin", "https://app.saige.example")
        .send(app(&origins).await)
        .await;

    assert_eq!(
        response.header("access-control-allow-origin").as_deref(),
        Some("https://app.saige.example")
    );
}

#[tokio::test]
async fn test_full_router_serves_chat_stream() {
    let frames = AxumTestRequest::post("/api/chat")
        .auth(&common::bearer("user_a"))
        .json(&json!({ "id": "chat-e2e", "messages": [{ "id": "u1", "role": "user", "content": "Hi" }] }))
        .send(app(&[]).await)
        .await
        .sse_frames();

    assert_eq!(frames.first().map(|f| f.event.as_str()), Some("id"));
    assert_eq!(frames.last().map(|f| f.event.as_str()), Some("done"));
}
