// ABOUTME: Request authentication from Authorization headers and session cookies
// ABOUTME: Extracts the identity-provider token and validates it with AuthManager
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use axum::http::{header, HeaderMap};
use tracing::field::Empty;
use tracing::{debug, warn, Span};

use crate::auth::{AuthManager, AuthResult};
use crate::errors::{AppError, AppResult};

/// Cookie the identity provider sets for browser sessions
pub const SESSION_COOKIE: &str = "__session";

/// Read a cookie value from the `Cookie` headers
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
        .filter(|value| !value.is_empty())
}

/// Extract the session token, preferring the `Authorization` header
#[must_use]
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned);

    bearer.or_else(|| get_cookie_value(headers, SESSION_COOKIE))
}

/// Authenticate a request; a missing token is `AuthRequired`
///
/// # Errors
///
/// Returns `AuthRequired` when no token is present and `AuthInvalid` or
/// `AuthExpired` when the token fails validation
#[tracing::instrument(skip_all, fields(user_id = Empty, success = Empty))]
pub fn authenticate_request(auth_manager: &AuthManager, headers: &HeaderMap) -> AppResult<AuthResult> {
    let Some(token) = extract_token(headers) else {
        debug!("Authentication failed: no session token");
        Span::current().record("success", false);
        return Err(AppError::auth_required());
    };

    match auth_manager.authenticate(&token) {
        Ok(result) => {
            Span::current()
                .record("user_id", result.user_id.as_str())
                .record("success", true);
            Ok(result)
        }
        Err(e) => {
            Span::current().record("success", false);
            warn!("Session token rejected: {e}");
            Err(AppError::auth_required())
        }
    }
}

/// Authenticate when a token is present; anonymous callers yield `None`
///
/// An invalid token is treated the same as no token so public resources stay
/// readable with a stale session.
#[must_use]
pub fn authenticate_optional(auth_manager: &AuthManager, headers: &HeaderMap) -> Option<AuthResult> {
    let token = extract_token(headers)?;
    auth_manager
        .authenticate(&token)
        .inspect_err(|e| debug!("Ignoring invalid session token: {e}"))
        .ok()
}
