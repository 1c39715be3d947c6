//! Errors raised while talking to Emohaa

use serde_json::Value;
use thiserror::Error;

/// Failure of a single upstream call.
///
/// Every variant is retryable at whole-turn granularity; the retry loop
/// treats them uniformly.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Emohaa answered with a structured error body (`{ status, title, detail }`)
    #[error("[Request to emohaa failed]: [{status}] {title} {detail}")]
    Protocol {
        status: i64,
        title: String,
        detail: String,
    },

    /// Network failure, timeout, or a broken response body
    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// No response head arrived within the allotted time
    #[error("Upstream did not respond within {0:?}")]
    Timeout(std::time::Duration),

    /// Credential contains bytes that cannot travel in an HTTP header
    #[error("Credential is not a valid header value")]
    InvalidCredential,

    /// Response could not be interpreted (empty body, unexpected shape, bad status)
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

/// Error that fails one attempt of a turn
pub type TurnError = UpstreamError;

impl UpstreamError {
    /// Build a protocol error when `body` is an object with a numeric `status`.
    pub fn from_error_body(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        let status = object.get("status")?;

        let status = status
            .as_i64()
            .or_else(|| status.as_f64().filter(|s| s.is_finite()).map(|s| s as i64))?;

        let text = |key: &str| match object.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Some(UpstreamError::Protocol {
            status,
            title: text("title"),
            detail: text("detail"),
        })
    }
}
