// ABOUTME: System prompts for chat completions and title generation
// ABOUTME: Renders the SAIGE persona prompt with the retrieved knowledge base context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # System Prompts
//!
//! The persona prompt is loaded at compile time from a markdown file. Each
//! request appends the retrieved context in a fenced block, which is rendered
//! even when retrieval found nothing.

use crate::constants::completion::{FALLBACK_TITLE, TITLE_MAX_CHARS};

/// SAIGE dental practice assistant persona
pub const SAIGE_SYSTEM_PROMPT: &str = include_str!("saige_system.md");

/// Instruction sent with the first user message to name a new chat
pub const TITLE_SYSTEM_PROMPT: &str =
    "Generate a short title (under 80 characters) based on this user message.";

/// Build the system prompt for one request
#[must_use]
pub fn build_system_prompt(context: &str) -> String {
    format!(
        "{}\n\nContext from knowledge base:\n---\n{context}\n---\n",
        SAIGE_SYSTEM_PROMPT.trim_end()
    )
}

/// Clean up a generated title
///
/// Trims whitespace and surrounding quotes and caps the length. An empty
/// result becomes the fallback title.
#[must_use]
pub fn normalize_title(raw: &str) -> String {
    let title = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if title.is_empty() {
        return FALLBACK_TITLE.to_owned();
    }
    title.chars().take(TITLE_MAX_CHARS).collect()
}
