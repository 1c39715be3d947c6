//! Emohaa SSE to OpenAI SSE transcoding
//!
//! The upstream chat call answers with an event stream whose payloads are raw
//! text fragments, terminated by a `[DONE]` payload. This module turns that
//! stream into either one buffered `chat.completion` object or a live sequence
//! of `chat.completion.chunk` frames.
//!
//! Streaming output always has the same shape:
//!
//! ```text
//! data: {role-init chunk}
//! data: {content chunk}      one per upstream payload, unmodified
//! data: {finish chunk}       only when the upstream sent [DONE]
//! data: [DONE]
//! ```
//!
//! Exactly one `data: [DONE]` is written, whatever way the upstream ends.

use std::convert::Infallible;

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use super::types::{
    CompletionMeta, CompletionResult, Delta, StreamChunk, Usage, ASSISTANT_ROLE,
    FINISH_REASON_STOP,
};
use crate::streaming::{SseEventParser, UpstreamEvent};
use crate::upstream::{ByteStream, UpstreamError};

/// Format a stream chunk as an SSE data event: `data: {json}\n\n`
pub fn format_sse_chunk(chunk: &StreamChunk) -> Bytes {
    let json = serde_json::to_string(chunk).expect("StreamChunk should always serialize");
    Bytes::from(format!("data: {}\n\n", json))
}

/// Format the SSE done marker: `data: [DONE]\n\n`
pub fn format_sse_done() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

/// Lifecycle of the streaming output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscoderState {
    /// Frames may still be written
    Streaming,
    /// The done marker has been written; nothing else ever will be
    Closed,
}

/// How a relayed stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Upstream sent the `[DONE]` sentinel
    Completed,
    /// Upstream body ended without a sentinel
    UpstreamClosed,
    /// Upstream body failed mid-stream
    Failed(String),
    /// The output stream was dropped before finishing (client went away)
    Abandoned,
}

impl StreamOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamOutcome::Completed => "completed",
            StreamOutcome::UpstreamClosed => "upstream_closed",
            StreamOutcome::Failed(_) => "failed",
            StreamOutcome::Abandoned => "abandoned",
        }
    }
}

/// Outcome plus the number of content frames relayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub outcome: StreamOutcome,
    pub content_chunks: usize,
}

/// Push-based chunk state machine.
///
/// Feed it parsed upstream events; it returns the frames to write. Every
/// emission is guarded by the state, so callers cannot write after the done
/// marker even if they keep feeding events.
#[derive(Debug)]
pub struct ChunkTranscoder {
    meta: CompletionMeta,
    state: TranscoderState,
    content_chunks: usize,
}

impl ChunkTranscoder {
    pub fn new(meta: CompletionMeta) -> Self {
        Self {
            meta,
            state: TranscoderState::Streaming,
            content_chunks: 0,
        }
    }

    pub fn state(&self) -> TranscoderState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == TranscoderState::Closed
    }

    /// Content frames emitted so far
    pub fn content_chunks(&self) -> usize {
        self.content_chunks
    }

    /// The role-init frame that opens the output
    pub fn open_frame(&self) -> Option<Bytes> {
        if self.is_closed() {
            return None;
        }
        let delta = Delta {
            role: Some(ASSISTANT_ROLE.to_string()),
            content: Some(String::new()),
        };
        Some(format_sse_chunk(&StreamChunk::new(&self.meta, delta, None, None)))
    }

    /// Handle one upstream event
    pub fn on_event(&mut self, event: &UpstreamEvent) -> Vec<Bytes> {
        if self.is_closed() {
            return Vec::new();
        }

        let event = match event {
            UpstreamEvent::Event(event) => event,
            UpstreamEvent::ReconnectInterval(_) => return Vec::new(),
        };

        if event.is_done() {
            let finish = StreamChunk::new(
                &self.meta,
                Delta::default(),
                Some(FINISH_REASON_STOP),
                Some(Usage::default()),
            );
            self.state = TranscoderState::Closed;
            return vec![format_sse_chunk(&finish), format_sse_done()];
        }

        let delta = Delta {
            role: None,
            content: Some(event.data.clone()),
        };
        self.content_chunks += 1;
        vec![format_sse_chunk(&StreamChunk::new(&self.meta, delta, None, None))]
    }

    /// Terminate the output. Returns the done marker the first time only.
    pub fn close(&mut self) -> Option<Bytes> {
        match self.state {
            TranscoderState::Streaming => {
                self.state = TranscoderState::Closed;
                Some(format_sse_done())
            }
            TranscoderState::Closed => None,
        }
    }
}

/// Drain the upstream body into one buffered completion.
///
/// Resolves at the sentinel, or with whatever arrived if the body ends
/// without one. A body error fails the attempt.
pub async fn collect_completion(
    mut body: ByteStream,
    meta: &CompletionMeta,
) -> Result<CompletionResult, UpstreamError> {
    let mut parser = SseEventParser::new();
    let mut content = String::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in parser.feed(&chunk) {
            let UpstreamEvent::Event(event) = event else {
                continue;
            };
            if event.is_done() {
                return Ok(CompletionResult::new(meta, content));
            }
            content.push_str(&event.data);
        }
    }

    if parser.has_pending() {
        debug!("Discarding unterminated upstream frame");
    }
    debug!(content_len = content.len(), "Upstream closed without sentinel");
    Ok(CompletionResult::new(meta, content))
}

/// Runs the completion callback exactly once, even if the output is dropped
struct CompletionGuard<F: FnOnce(StreamSummary)> {
    callback: Option<F>,
    content_chunks: usize,
}

impl<F: FnOnce(StreamSummary)> CompletionGuard<F> {
    fn new(callback: F) -> Self {
        Self {
            callback: Some(callback),
            content_chunks: 0,
        }
    }

    fn finish(&mut self, outcome: StreamOutcome) {
        if let Some(callback) = self.callback.take() {
            callback(StreamSummary {
                outcome,
                content_chunks: self.content_chunks,
            });
        }
    }
}

impl<F: FnOnce(StreamSummary)> Drop for CompletionGuard<F> {
    fn drop(&mut self) {
        self.finish(StreamOutcome::Abandoned);
    }
}

/// Relay the upstream body as OpenAI chunk frames.
///
/// Upstream errors never surface to the caller: the output is closed with the
/// done marker instead. `on_complete` runs after the last frame is written,
/// or when the output is dropped early.
pub fn transcode<F>(
    mut body: ByteStream,
    meta: CompletionMeta,
    on_complete: F,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static
where
    F: FnOnce(StreamSummary) + Send + 'static,
{
    stream! {
        let mut guard = CompletionGuard::new(on_complete);
        let mut transcoder = ChunkTranscoder::new(meta);
        let mut parser = SseEventParser::new();

        if let Some(frame) = transcoder.open_frame() {
            yield Ok::<Bytes, Infallible>(frame);
        }

        let outcome = loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    for event in parser.feed(&chunk) {
                        for frame in transcoder.on_event(&event) {
                            yield Ok(frame);
                        }
                        if transcoder.is_closed() {
                            break;
                        }
                    }
                    guard.content_chunks = transcoder.content_chunks();
                    if transcoder.is_closed() {
                        break StreamOutcome::Completed;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Upstream stream failed, closing output");
                    break StreamOutcome::Failed(e.to_string());
                }
                None => {
                    if parser.has_pending() {
                        debug!("Discarding unterminated upstream frame");
                    }
                    break StreamOutcome::UpstreamClosed;
                }
            }
        };

        if let Some(frame) = transcoder.close() {
            yield Ok(frame);
        }
        guard.finish(outcome);
    }
}
