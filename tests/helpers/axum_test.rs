// ABOUTME: Axum HTTP testing utilities for integration tests
// ABOUTME: Drives routers in-process and parses server-sent event bodies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;

/// Helper to build and execute HTTP requests against Axum routers
pub struct AxumTestRequest {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl AxumTestRequest {
    fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_owned(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a new GET request
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Create a new POST request
    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Create a new DELETE request
    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    /// Create a new PATCH request
    pub fn patch(uri: &str) -> Self {
        Self::new(Method::PATCH, uri)
    }

    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Add an `Authorization` header
    pub fn auth(self, value: &str) -> Self {
        self.header(header::AUTHORIZATION.as_str(), value)
    }

    /// Add JSON body to the request
    pub fn json<T: Serialize>(mut self, data: &T) -> Self {
        self.body = Some(serde_json::to_string(data).expect("Failed to serialize JSON"));
        self.headers.push((
            header::CONTENT_TYPE.as_str().to_owned(),
            "application/json".to_owned(),
        ));
        self
    }

    /// Set a raw body without touching the content type
    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.to_owned());
        self
    }

    /// Execute the request against an Axum router
    ///
    /// Streaming bodies are read to completion, so SSE responses return once
    /// the relay task has finished.
    pub async fn send(self, app: Router) -> AxumTestResponse {
        let mut builder = Request::builder().method(self.method).uri(self.uri);

        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }

        let body = self.body.unwrap_or_default();
        let request = builder
            .body(Body::from(body))
            .expect("Failed to build request");

        tokio::time::timeout(std::time::Duration::from_secs(10), async {
            let response = app
                .oneshot(request)
                .await
                .expect("Failed to execute request");
            AxumTestResponse::from_response(response).await
        })
        .await
        .expect("Request did not complete in time")
    }
}

/// One parsed server-sent event
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    /// Event name, empty when the frame had none
    pub event: String,
    /// Data payload parsed as JSON
    pub data: Value,
}

/// Wrapper around Axum HTTP response for testing
pub struct AxumTestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl AxumTestResponse {
    /// Create from response by eagerly reading the body
    async fn from_response(response: axum::http::Response<Body>) -> Self {
        use axum::body::to_bytes;
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body")
            .to_vec();
        Self {
            status,
            headers,
            body,
        }
    }

    /// Get the response status code as u16 for easy assertion
    pub const fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Get the response status code as `StatusCode`
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Get a response header as a string
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
    }

    /// Get the response body as a JSON value
    pub fn json<T: serde::de::DeserializeOwned>(self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to deserialize JSON response")
    }

    /// Get the response body as a string
    pub fn text(self) -> String {
        String::from_utf8(self.body).expect("Failed to decode response as UTF-8")
    }

    /// Message of a `{"error": {"code", "message"}}` body
    pub fn error_message(self) -> String {
        let body: Value = self.json();
        body["error"]["message"]
            .as_str()
            .expect("Response is not an error body")
            .to_owned()
    }

    /// Parse the body as a server-sent event stream, skipping keep-alive comments
    pub fn sse_frames(self) -> Vec<SseFrame> {
        let text = self.text();
        text.split("\n\n")
            .filter_map(|block| {
                let mut event = String::new();
                let mut data = Vec::new();
                for line in block.lines() {
                    if let Some(name) = line.strip_prefix("event:") {
                        event = name.trim().to_owned();
                    } else if let Some(payload) = line.strip_prefix("data:") {
                        data.push(payload.strip_prefix(' ').unwrap_or(payload));
                    }
                }
                if data.is_empty() {
                    return None;
                }
                let data = serde_json::from_str(&data.join("\n")).expect("SSE data is not JSON");
                Some(SseFrame { event, data })
            })
            .collect()
    }

    /// Assert that the status code matches
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {}",
            expected, self.status
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json};

    #[tokio::test]
    async fn test_axum_test_request_post_with_json() {
        let app = Router::new().route(
            "/test",
            axum::routing::post(|Json(body): Json<Value>| async move {
                Json(serde_json::json!({"received": body}))
            }),
        );
        let response = AxumTestRequest::post("/test")
            .json(&serde_json::json!({"key": "value"}))
            .send(app)
            .await;
        assert_eq!(response.status(), 200);
        let json: Value = response.json();
        assert_eq!(json["received"]["key"], "value");
    }

    #[tokio::test]
    async fn test_sse_frames_parse_named_events() {
        let app = Router::new().route(
            "/events",
            get(|| async { "event: id\ndata: {\"id\":\"m1\"}\n\n:\n\nevent: done\ndata: {}\n\n" }),
        );
        let frames = AxumTestRequest::get("/events").send(app).await.sse_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "id");
        assert_eq!(frames[0].data["id"], "m1");
        assert_eq!(frames[1].event, "done");
    }
}
