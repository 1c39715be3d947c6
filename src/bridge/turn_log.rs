//! Per-turn structured logging
//!
//! Every logical chat call gets a short trace id so its attempts, retries and
//! stream completion can be correlated in the logs.

use std::time::Instant;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Correlation and timing for one logical chat call
#[derive(Debug, Clone)]
pub struct TurnContext {
    /// Short id for log correlation
    pub trace_id: String,
    /// When the call started
    pub start_time: Instant,
    pub streaming: bool,
    /// Number of inbound messages
    pub message_count: usize,
}

impl TurnContext {
    pub fn new(streaming: bool, message_count: usize) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string()[..8].to_string(),
            start_time: Instant::now(),
            streaming,
            message_count,
        }
    }

    /// Elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    pub fn mode(&self) -> &'static str {
        if self.streaming {
            "streaming"
        } else {
            "buffered"
        }
    }

    pub fn log_turn_start(&self, prompt_len: usize) {
        info!(
            trace_id = %self.trace_id,
            mode = self.mode(),
            messages = self.message_count,
            prompt_len = prompt_len,
            "Turn started"
        );
    }

    pub fn log_session_opened(&self, attempt: u32, session_id: &str) {
        debug!(
            trace_id = %self.trace_id,
            attempt = attempt + 1,
            session_id = %session_id,
            elapsed_ms = %self.elapsed_ms(),
            "Upstream session opened"
        );
    }

    pub fn log_attempt_failed(&self, attempt: u32, error: &str) {
        warn!(
            trace_id = %self.trace_id,
            mode = self.mode(),
            attempt = attempt + 1,
            elapsed_ms = %self.elapsed_ms(),
            error = %error,
            "Turn attempt failed"
        );
    }

    /// Log a buffered turn that produced its completion
    pub fn log_turn_complete(&self, content_len: usize) {
        info!(
            trace_id = %self.trace_id,
            mode = self.mode(),
            content_len = content_len,
            elapsed_ms = %self.elapsed_ms(),
            "Turn completed"
        );
    }

    /// Log the end of a relayed stream
    pub fn log_stream_ended(&self, outcome: &str, content_chunks: usize) {
        info!(
            trace_id = %self.trace_id,
            outcome = %outcome,
            content_chunks = content_chunks,
            elapsed_ms = %self.elapsed_ms(),
            "Stream transfer completed"
        );
    }

    pub fn log_turn_failed(&self, error: &str) {
        error!(
            trace_id = %self.trace_id,
            mode = self.mode(),
            elapsed_ms = %self.elapsed_ms(),
            error = %error,
            "Turn failed after all attempts"
        );
    }
}
