// ABOUTME: Validation of session tokens issued by the external identity provider
// ABOUTME: Verifies RS256 or HS256 JWT signatures, expiry, and issuer, yielding the user id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # Authentication
//!
//! Sign-in is owned by the identity provider. The server only checks the
//! session token the provider hands to the browser: the signature against the
//! provider's published RS256 key (or a shared HS256 secret in development),
//! the expiry, and optionally the issuer. The `sub` claim is the user id.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::environment::AuthConfig;
use crate::errors::{AppError, AppResult};

/// `JWT` validation error with detailed information
#[derive(Debug, Clone, Error)]
pub enum JwtValidationError {
    /// Token has expired
    #[error("JWT token expired at {}", expired_at.format("%Y-%m-%d %H:%M:%S UTC"))]
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// Token signature or claims are invalid
    #[error("JWT token is invalid: {reason}")]
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is malformed (not proper `JWT` format)
    #[error("JWT token is malformed: {details}")]
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl From<JwtValidationError> for AppError {
    fn from(error: JwtValidationError) -> Self {
        match error {
            JwtValidationError::TokenExpired { .. } => Self::auth_expired(),
            other => Self::auth_invalid(other.to_string()),
        }
    }
}

/// Claims carried by identity-provider session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User `ID`
    pub sub: String,
    /// Primary email, when the provider includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// Identity provider user `ID`
    pub user_id: String,
    /// Email from the token, if present
    pub email: Option<String>,
}

/// Validates identity-provider session tokens
#[derive(Clone)]
pub struct AuthManager {
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: Option<String>,
}

impl AuthManager {
    /// Validate HS256 tokens signed with a shared secret
    #[must_use]
    pub fn from_secret(secret: &[u8], issuer: Option<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            issuer,
        }
    }

    /// Validate RS256 tokens against the provider's PEM public key
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM cannot be parsed as an RSA public key
    pub fn from_rsa_pem(pem: &[u8], issuer: Option<String>) -> AppResult<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| AppError::config(format!("Invalid AUTH_JWT_PUBLIC_KEY: {e}")))?;
        Ok(Self {
            decoding_key,
            algorithm: Algorithm::RS256,
            issuer,
        })
    }

    /// Build from configuration, preferring the RS256 public key
    ///
    /// # Errors
    ///
    /// Returns an error if no key is configured or the public key is invalid
    pub fn from_config(config: &AuthConfig) -> AppResult<Self> {
        if let Some(pem) = &config.jwt_public_key_pem {
            // Env vars often carry PEM with literal \n sequences
            let pem = pem.replace("\\n", "\n");
            return Self::from_rsa_pem(pem.as_bytes(), config.issuer.clone());
        }
        config.jwt_secret.as_ref().map_or_else(
            || {
                Err(AppError::config(
                    "Either AUTH_JWT_PUBLIC_KEY or AUTH_JWT_SECRET must be set",
                ))
            },
            |secret| Ok(Self::from_secret(secret.as_bytes(), config.issuer.clone())),
        )
    }

    /// Algorithm this manager accepts
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked separately to report when the token expired
        validation.validate_exp = false;
        validation.validate_aud = false;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }
        validation
    }

    fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> JwtValidationError {
        match e.kind() {
            ErrorKind::InvalidSignature => JwtValidationError::TokenInvalid {
                reason: "Token signature verification failed".into(),
            },
            ErrorKind::InvalidIssuer => JwtValidationError::TokenInvalid {
                reason: "Token issuer is not trusted".into(),
            },
            ErrorKind::InvalidAlgorithm => JwtValidationError::TokenInvalid {
                reason: "Token algorithm is not accepted".into(),
            },
            ErrorKind::InvalidToken => JwtValidationError::TokenMalformed {
                details: "Token format is invalid".into(),
            },
            ErrorKind::Base64(base64_err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid base64: {base64_err}"),
            },
            ErrorKind::Json(json_err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid JSON: {json_err}"),
            },
            _ => JwtValidationError::TokenInvalid {
                reason: format!("Token validation failed: {e}"),
            },
        }
    }

    /// Validate a token with detailed error information
    ///
    /// # Errors
    ///
    /// Returns a [`JwtValidationError`] if the signature, issuer, or expiry
    /// check fails, or the token is not a well-formed `JWT`
    pub fn validate_token_detailed(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| {
                warn!("JWT token validation failed: {e:?}");
                Self::convert_jwt_error(&e)
            })?;

        let now = Utc::now();
        if now.timestamp() > claims.exp {
            let expired_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or(now);
            warn!(user_id = %claims.sub, "JWT token expired at {}", expired_at.to_rfc3339());
            return Err(JwtValidationError::TokenExpired { expired_at });
        }

        if claims.sub.trim().is_empty() {
            return Err(JwtValidationError::TokenInvalid {
                reason: "Token has no subject".into(),
            });
        }

        debug!(user_id = %claims.sub, "JWT token validation successful");
        Ok(claims)
    }

    /// Validate a token and return the authenticated caller
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` or `AuthExpired` when validation fails
    pub fn authenticate(&self, token: &str) -> AppResult<AuthResult> {
        let claims = self.validate_token_detailed(token)?;
        Ok(AuthResult {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}
