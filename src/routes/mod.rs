// ABOUTME: Route module organization for the Saige HTTP API
// ABOUTME: Groups chat, history, vote, and health endpoints by domain
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! Route module for the Saige server
//!
//! Each domain module exposes a `*Routes::routes` constructor returning an
//! axum `Router` with its state already attached.

/// Chat relay, read, sharing, and deletion routes
pub mod chat;
/// JSON body extraction with API error mapping
pub mod extract;
/// Health check and readiness routes
pub mod health;
/// Chat history routes
pub mod history;
/// Message vote routes
pub mod vote;

/// Chat route handlers
pub use chat::ChatRoutes;
/// JSON body extractor
pub use extract::ApiJson;
/// Health route handlers
pub use health::HealthRoutes;
/// History route handlers
pub use history::HistoryRoutes;
/// Vote route handlers
pub use vote::VoteRoutes;
