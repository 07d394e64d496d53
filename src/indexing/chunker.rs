// ABOUTME: Fixed-window text chunking with overlap for knowledge base files
// ABOUTME: Windows are measured in characters so multi-byte text never splits mid-codepoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use crate::errors::{AppError, AppResult};

/// Splits documents into overlapping fixed-size windows
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or `overlap` is not smaller
    /// than `chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::invalid_input("Chunk size must be greater than zero"));
        }
        if overlap >= chunk_size {
            return Err(AppError::invalid_input(format!(
                "Chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Split `text` into windows
    ///
    /// Each window starts `chunk_size - overlap` characters after the previous
    /// one. Once the next window would only repeat the overlap, the loop stops
    /// and any remaining tail is appended unless it equals the last window.
    /// Whitespace-only windows are dropped.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let step = self.chunk_size - self.overlap;

        let mut chunks: Vec<String> = Vec::new();
        let mut start = 0;
        while start < len {
            let end = (start + self.chunk_size).min(len);
            chunks.push(chars[start..end].iter().collect());
            start += step;
            if start + self.overlap >= len {
                break;
            }
        }

        if start < len {
            let tail: String = chars[start..].iter().collect();
            if chunks.last() != Some(&tail) {
                chunks.push(tail);
            }
        }

        chunks.retain(|chunk| !chunk.trim().is_empty());
        chunks
    }
}
