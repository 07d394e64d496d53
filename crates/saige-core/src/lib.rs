// ABOUTME: Core types and constants for the Saige knowledge-base chat server
// ABOUTME: Foundation crate with error handling, chat/vote models, and RAG defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

#![deny(unsafe_code)]

//! # Saige Core
//!
//! Foundation crate providing shared types and constants for the Saige
//! assistant. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Retrieval, prompt, and indexing defaults
//! - **models**: Chat, message, vote, and context chunk records

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants and default values organized by domain
pub mod constants;

/// Core data models (Chat, Message, Vote, `ContextChunk`)
pub mod models;
