//! Configuration management for the Emohaa bridge
//!
//! Configuration is loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::bridge::RetryPolicy;

/// Default upstream API base URL
pub const DEFAULT_UPSTREAM_URL: &str = "https://ai-role.cn/echo-prod";

/// Default model name reported to clients
pub const DEFAULT_MODEL: &str = "emohaa";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Emohaa API base URL (without trailing slash)
    pub upstream_url: String,
    /// Model name used in completion ids and responses
    pub model: String,

    /// Retries after the first failed attempt of a turn
    pub max_retries: u32,
    /// Fixed delay between attempts (in milliseconds)
    pub retry_delay_ms: u64,

    /// Timeout for session create/delete calls (in seconds)
    pub session_timeout_secs: u64,
    /// Timeout for the streaming chat call (in seconds)
    pub chat_timeout_secs: u64,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_retries: 3,
            retry_delay_ms: 5000,
            session_timeout_secs: 15,
            chat_timeout_secs: 120,
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: env::var("EMOHAA_HOST").unwrap_or(defaults.host),
            port: parse_var("EMOHAA_PORT", defaults.port)?,

            upstream_url: env::var("EMOHAA_UPSTREAM_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.upstream_url),
            model: env::var("EMOHAA_MODEL").unwrap_or(defaults.model),

            max_retries: parse_var("EMOHAA_MAX_RETRIES", defaults.max_retries)?,
            retry_delay_ms: parse_var("EMOHAA_RETRY_DELAY_MS", defaults.retry_delay_ms)?,

            session_timeout_secs: parse_var(
                "EMOHAA_SESSION_TIMEOUT_SECS",
                defaults.session_timeout_secs,
            )?,
            chat_timeout_secs: parse_var("EMOHAA_CHAT_TIMEOUT_SECS", defaults.chat_timeout_secs)?,

            log_json: env::var("EMOHAA_LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.log_json),
        })
    }

    /// Retry policy for whole-turn retries
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Timeout applied to session create/delete calls
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Timeout applied to the streaming chat call
    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}
