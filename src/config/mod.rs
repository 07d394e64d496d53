// ABOUTME: Configuration management module for the Saige server
// ABOUTME: Environment-only configuration for HTTP, database, auth, and hosted APIs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! Configuration module
//!
//! All settings come from environment variables; see
//! [`environment::ServerConfig::from_env`].

/// Environment and server configuration
pub mod environment;
