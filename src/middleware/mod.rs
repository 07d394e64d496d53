// ABOUTME: HTTP middleware for request tracing, authentication, and CORS
// ABOUTME: Provides request ID generation, span creation, and session token extraction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

pub mod auth;
pub mod cors;
pub mod tracing;

// Authentication helpers
pub use auth::{authenticate_optional, authenticate_request, extract_token};

// CORS configuration
pub use cors::setup_cors;

// Request tracing
pub use tracing::{create_request_span, make_request_span, MakeSaigeRequestId, REQUEST_ID_HEADER};
