//! Emohaa API client
//!
//! HTTP client for the three Emohaa endpoints a turn needs: session create,
//! the streaming chat call, and session delete.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, error, instrument};

use super::{
    headers::build_disguise_headers, signature::XssSignature, ByteStream, UpstreamApi,
    UpstreamError,
};
use crate::config::Config;

/// Persona the chat endpoint is asked to answer as
const CHAT_ROLE: &str = "echo";

/// Fields that may carry the session id when Emohaa wraps it in an object
const SESSION_ID_FIELDS: &[&str] = &["id", "cid", "convId", "conversation_id", "data"];

/// Emohaa API client
pub struct EmohaaClient {
    client: reqwest::Client,
    base_url: String,
    session_timeout: Duration,
    chat_timeout: Duration,
}

impl EmohaaClient {
    /// Create a new Emohaa client
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.upstream_url.trim_end_matches('/').to_string(),
            session_timeout: config.session_timeout(),
            chat_timeout: config.chat_timeout(),
        }
    }

    /// Disguise headers plus a freshly generated signature
    fn signed_headers(
        &self,
        credential: &str,
        signature: &XssSignature,
    ) -> Result<HeaderMap, UpstreamError> {
        let mut headers = build_disguise_headers(credential)?;
        signature.apply(&mut headers);
        Ok(headers)
    }
}

#[async_trait]
impl UpstreamApi for EmohaaClient {
    #[instrument(skip(self, credential))]
    async fn create_session(&self, credential: &str) -> Result<String, UpstreamError> {
        let url = format!("{}/generate/id", self.base_url);
        let headers = self.signed_headers(credential, &XssSignature::generate())?;

        debug!(url = %url, "Creating Emohaa session");

        let response = self
            .client
            .get(&url)
            .query(&[("create", "true")])
            .headers(headers)
            .timeout(self.session_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, body_len = body.len(), "Emohaa session response");

        let value = check_result(status, &body)?;
        let session_id = value
            .as_ref()
            .and_then(extract_session_id)
            .ok_or_else(|| {
                error!(status = %status, body = %body, "Emohaa returned no session id");
                UpstreamError::InvalidResponse(format!("no session id in response: {}", body))
            })?;

        debug!(session_id = %session_id, "Emohaa session created");
        Ok(session_id)
    }

    #[instrument(skip(self, credential), fields(session_id = %session_id))]
    async fn delete_session(
        &self,
        session_id: &str,
        credential: &str,
    ) -> Result<(), UpstreamError> {
        let url = format!("{}/conv", self.base_url);
        let headers = self.signed_headers(credential, &XssSignature::generate())?;

        let response = self
            .client
            .delete(&url)
            .query(&[("cid", session_id)])
            .headers(headers)
            .timeout(self.session_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        check_result(status, &body)?;

        debug!(status = %status, "Emohaa session deleted");
        Ok(())
    }

    #[instrument(skip(self, prompt, credential), fields(session_id = %session_id, prompt_len = prompt.len()))]
    async fn open_chat(
        &self,
        session_id: &str,
        prompt: &str,
        credential: &str,
    ) -> Result<ByteStream, UpstreamError> {
        let url = format!("{}/chat", self.base_url);
        let signature = XssSignature::generate();
        let headers = self.signed_headers(credential, &signature)?;

        let mut query = vec![
            ("token", credential),
            ("cid", session_id),
            ("prompt", prompt),
            ("role", CHAT_ROLE),
        ];
        query.extend(signature.query_pairs());

        debug!(url = %url, "Opening Emohaa chat stream");

        // Only waiting for the response head is bounded; a reply that keeps
        // delivering data may stream for as long as it needs.
        let request = self.client.get(&url).query(&query).headers(headers).send();
        let response = tokio::time::timeout(self.chat_timeout, request)
            .await
            .map_err(|_| UpstreamError::Timeout(self.chat_timeout))??;

        let status = response.status();
        if !status.is_success() {
            let body = tokio::time::timeout(self.chat_timeout, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            error!(status = %status, body = %body, "Emohaa chat request failed");
            check_result(status, &body)?;
            return Err(UpstreamError::InvalidResponse(format!(
                "chat request returned {}",
                status
            )));
        }

        debug!(status = %status, "Emohaa chat stream opened");
        Ok(Box::pin(response.bytes_stream().map_err(UpstreamError::from)))
    }
}

/// Interpret a raw Emohaa response body.
///
/// A JSON object with a numeric `status` is an error regardless of the HTTP
/// status. Any other non-2xx response is an error too. Otherwise the parsed
/// body is returned: JSON when it parses, the trimmed text when it does not,
/// `None` when empty.
pub(crate) fn check_result(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<Option<Value>, UpstreamError> {
    let trimmed = body.trim();
    let value = if trimmed.is_empty() {
        None
    } else {
        Some(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
    };

    if let Some(err) = value.as_ref().and_then(UpstreamError::from_error_body) {
        return Err(err);
    }

    if !status.is_success() {
        return Err(UpstreamError::InvalidResponse(format!(
            "status {}: {}",
            status, trimmed
        )));
    }

    Ok(value)
}

/// Pull the session id out of a bare identifier or a wrapping object
pub(crate) fn extract_session_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => SESSION_ID_FIELDS
            .iter()
            .filter_map(|field| map.get(*field))
            .find_map(extract_session_id),
        _ => None,
    }
}
