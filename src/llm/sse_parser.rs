// ABOUTME: Line-buffering parser for the completion API's server-sent event stream
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! # SSE Stream Parser
//!
//! Network chunks do not line up with SSE event boundaries. A single chunk may
//! carry several `data:` lines, and one JSON payload may be split across two
//! chunks, possibly in the middle of a multi-byte character. [`SseLineBuffer`]
//! accumulates raw bytes and only decodes complete lines.
//!
//! The caller supplies a `parse_data` closure turning each JSON payload into a
//! [`StreamChunk`]; framing and the `[DONE]` sentinel are handled here.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{future, Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

const DONE_LINE: &str = "data: [DONE]";

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The `[DONE]` termination signal
    Done,
}

/// Parse one complete line; non-data fields and blank separators yield `None`
fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    if trimmed == DONE_LINE {
        return Some(SseEvent::Done);
    }
    trimmed
        .strip_prefix("data:")
        .map(str::trim_start)
        .filter(|data| !data.trim().is_empty())
        .map(|data| SseEvent::Data(data.to_owned()))
}

/// Line buffer for SSE streams
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a network chunk and return every event completed by it
    ///
    /// A trailing partial line stays buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }

    /// Parse whatever is left once the byte stream has ended
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&remaining))
            .into_iter()
            .collect()
    }
}

struct SseStreamState<F> {
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    parser: SseLineBuffer,
    pending: VecDeque<Result<StreamChunk, AppError>>,
    parse_data: F,
    service_name: &'static str,
    stream_ended: bool,
}

impl<F> SseStreamState<F>
where
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>>,
{
    fn enqueue(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Data(json_str) => {
                    if let Some(result) = (self.parse_data)(&json_str) {
                        self.pending.push_back(result);
                    }
                }
                SseEvent::Done => self.pending.push_back(Ok(StreamChunk {
                    delta: String::new(),
                    is_final: true,
                    finish_reason: Some("stop".to_owned()),
                })),
            }
        }
    }
}

/// Wrap a raw `reqwest` byte stream into a stream of completion chunks
///
/// `parse_data` returns `None` for payloads that carry no output (role-only
/// deltas, usage frames). Empty non-final deltas are dropped.
pub fn create_sse_stream<S, F>(
    byte_stream: S,
    parse_data: F,
    service_name: &'static str,
) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let state = SseStreamState {
        byte_stream: Box::pin(byte_stream),
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        parse_data,
        service_name,
        stream_ended: false,
    };

    let stream = unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.stream_ended {
                return None;
            }

            match state.byte_stream.next().await {
                Some(Ok(bytes)) => {
                    let events = state.parser.feed(&bytes);
                    state.enqueue(events);
                }
                Some(Err(e)) => {
                    state.stream_ended = true;
                    let error = AppError::external_service(
                        state.service_name,
                        format!("Stream read error: {e}"),
                    );
                    return Some((Err(error), state));
                }
                None => {
                    state.stream_ended = true;
                    let events = state.parser.flush();
                    state.enqueue(events);
                }
            }
        }
    });

    let filtered = stream.filter(|result| {
        future::ready(
            result
                .as_ref()
                .map_or(true, |chunk| !chunk.delta.is_empty() || chunk.is_final),
        )
    });

    Box::pin(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"data: {\"a\":1}\n\ndata: {\"a\":2}\n\ndata: [DONE]\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_owned()),
                SseEvent::Data("{\"a\":2}".to_owned()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn test_payload_split_across_chunks() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(b"data: {\"text\":\"hel").is_empty());
        let events = buffer.feed(b"lo\"}\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"text\":\"hello\"}".to_owned())]);
    }

    #[test]
    fn test_character_split_across_chunks() {
        let payload = "data: {\"t\":\"café – done\"}\n".as_bytes();
        let split = payload
            .iter()
            .position(|&b| b == 0xC3)
            .map(|pos| pos + 1)
            .unwrap();

        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(&payload[..split]).is_empty());
        let events = buffer.feed(&payload[split..]);
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"t\":\"café – done\"}".to_owned())]
        );
    }

    #[test]
    fn test_flush_decodes_buffered_multibyte_tail() {
        let mut buffer = SseLineBuffer::new();
        let tail = "data: ’".as_bytes();
        assert!(buffer.feed(&tail[..tail.len() - 1]).is_empty());
        assert!(buffer.feed(&tail[tail.len() - 1..]).is_empty());
        assert_eq!(buffer.flush(), vec![SseEvent::Data("’".to_owned())]);
    }

    #[test]
    fn test_non_data_fields_ignored() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b": keep-alive\nevent: ping\nretry: 100\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_flush_parses_unterminated_line() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(b"data: tail").is_empty());
        assert_eq!(buffer.flush(), vec![SseEvent::Data("tail".to_owned())]);
        assert!(buffer.flush().is_empty());
    }

    #[tokio::test]
    async fn test_stream_yields_deltas_then_final() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: Hel")),
            Ok(Bytes::from_static(b"lo\n\ndata: \n\ndata: world\n\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ];
        let parse = |data: &str| {
            Some(Ok(StreamChunk {
                delta: data.to_owned(),
                is_final: false,
                finish_reason: None,
            }))
        };

        let collected: Vec<StreamChunk> = create_sse_stream(stream::iter(chunks), parse, "test")
            .filter_map(|item| future::ready(item.ok()))
            .collect()
            .await;

        let deltas: Vec<&str> = collected.iter().map(|c| c.delta.as_str()).collect();
        assert_eq!(deltas, vec!["Hello", "world", ""]);
        assert!(collected.last().is_some_and(|c| c.is_final));
    }
}
