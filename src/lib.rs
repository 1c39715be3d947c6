//! Emohaa bridge - OpenAI-compatible chat completions for Emohaa
//!
//! This library provides the core functionality for the bridge server.
//! It turns OpenAI chat completion requests into Emohaa's session-scoped
//! chat protocol and relays the reply, buffered or as live SSE chunks.

pub mod bridge;
pub mod config;
pub mod error;
pub mod routes;
pub mod streaming;
pub mod upstream;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

pub use crate::bridge::ChatBridge;
pub use crate::config::Config;
pub use crate::upstream::{EmohaaClient, UpstreamApi};

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub bridge: Arc<ChatBridge>,
    pub start_time: Instant,
    /// Unix timestamp (seconds) of startup
    pub started_at: i64,
}

impl AppState {
    /// Create a new application state talking to the configured Emohaa endpoint
    pub fn new(config: Config) -> Result<Self> {
        // Per-call timeouts are set on each request
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .build()?;

        let upstream: Arc<dyn UpstreamApi> = Arc::new(EmohaaClient::new(http_client, &config));

        Ok(Self::with_upstream(config, upstream))
    }

    /// Create an application state around any upstream implementation
    pub fn with_upstream(config: Config, upstream: Arc<dyn UpstreamApi>) -> Self {
        let bridge = Arc::new(ChatBridge::new(
            upstream,
            config.retry_policy(),
            config.model.clone(),
        ));

        Self {
            config,
            bridge,
            start_time: Instant::now(),
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}
