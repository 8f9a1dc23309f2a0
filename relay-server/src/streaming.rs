//! Server-Sent Events relay for streamed completions.
//!
//! Every upstream delta becomes `data: {"choices":[{"delta":{"content":...}}]}`,
//! a failure becomes a single `data: {"error":...}` frame, and the stream always
//! finishes with `data: [DONE]`. Failures never reach the transport: the HTTP
//! exchange is a 200 that closes cleanly.

use async_stream::stream;
use axum::response::sse::{Event, Sse};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use relay_shared::{StreamChunk, StreamError};
use serde::Serialize;
use std::convert::Infallible;
use tracing::{debug, error};

use crate::llm::FragmentStream;

const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Content(String),
    Error(String),
    Done,
}

impl Frame {
    /// Payload carried after `data: ` on the wire.
    pub fn data(&self) -> String {
        match self {
            Frame::Content(text) => to_json(&StreamChunk::content(text.as_str())),
            Frame::Error(message) => to_json(&StreamError {
                error: message.clone(),
            }),
            Frame::Done => DONE_MARKER.to_string(),
        }
    }

    pub fn into_event(self) -> Event {
        Event::default().data(self.data())
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        error!("Failed to serialize frame: {}", e);
        r#"{"error":"failed to serialize frame"}"#.to_string()
    })
}

/// Turns upstream fragments into relay frames.
///
/// Empty fragments are dropped. The first upstream error produces one
/// `Error` frame and stops polling upstream. `Done` is always last.
pub fn relay_frames(mut upstream: FragmentStream) -> impl Stream<Item = Frame> + Send {
    stream! {
        let mut relayed = 0usize;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(fragment) if fragment.content.is_empty() => {}
                Ok(fragment) => {
                    relayed += 1;
                    yield Frame::Content(fragment.content);
                }
                Err(e) => {
                    error!("Completion stream failed after {} fragments: {}", relayed, e);
                    yield Frame::Error(e.to_string());
                    break;
                }
            }
        }
        debug!("Completion stream closed after {} fragments", relayed);
        yield Frame::Done;
    }
}

pub fn sse_response(
    upstream: FragmentStream,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send> {
    // No keep-alive: the body carries relay frames and nothing else.
    let events = relay_frames(upstream).map(|frame| Ok(frame.into_event()));
    Sse::new(events)
}
