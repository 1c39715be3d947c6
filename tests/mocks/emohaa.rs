//! Mock Emohaa upstream for testing
//!
//! Provides wiremock-based mocks for the three Emohaa endpoints:
//! - GET /generate/id?create=true - Session creation
//! - GET /chat - Streaming chat (SSE)
//! - DELETE /conv?cid= - Session deletion
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::mocks::emohaa::MockEmohaa;
//!
//! #[tokio::test]
//! async fn test_with_emohaa_mock() {
//!     let emohaa = MockEmohaa::start().await;
//!     emohaa.mock_create_session("conv-1").await;
//!     emohaa.mock_chat_stream(&["Hello", "[DONE]"]).await;
//!     emohaa.mock_delete_session().await;
//!
//!     // Use emohaa.uri() as EMOHAA_UPSTREAM_URL
//! }
//! ```

#![allow(dead_code)]

use std::time::Duration;

use serde_json::json;
use wiremock::{
    matchers::{header_exists, method, path, query_param},
    Mock, MockServer, Request, ResponseTemplate,
};

/// Render upstream payloads as an SSE body, one event per payload
pub fn sse_body(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|payload| format!("data: {}\n\n", payload))
        .collect()
}

/// Mock Emohaa server wrapper
pub struct MockEmohaa {
    server: MockServer,
}

impl MockEmohaa {
    /// Start a new mock Emohaa server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get the mock server URI
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    // =========================================================================
    // GET /generate/id - Session creation
    // =========================================================================

    /// Session creation returns a bare identifier
    pub async fn mock_create_session(&self, session_id: &str) {
        Mock::given(method("GET"))
            .and(path("/generate/id"))
            .and(query_param("create", "true"))
            .and(header_exists("Authorization"))
            .and(header_exists("X-Xss-Real"))
            .respond_with(ResponseTemplate::new(200).set_body_string(session_id))
            .mount(&self.server)
            .await;
    }

    /// Session creation answers with a structured error body
    pub async fn mock_create_session_error(&self, status: i64, title: &str, detail: &str) {
        Mock::given(method("GET"))
            .and(path("/generate/id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": status,
                "title": title,
                "detail": detail
            })))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // GET /chat - Streaming chat
    // =========================================================================

    /// Chat answers with one SSE event per payload
    pub async fn mock_chat_stream(&self, payloads: &[&str]) {
        self.mock_chat_body(sse_body(payloads)).await;
    }

    /// Chat answers with a raw SSE body
    pub async fn mock_chat_body(&self, body: String) {
        Mock::given(method("GET"))
            .and(path("/chat"))
            .and(query_param("role", "echo"))
            .and(header_exists("Authorization"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("Content-Type", "text/event-stream"),
            )
            .mount(&self.server)
            .await;
    }

    /// Chat fails with a bare HTTP status
    pub async fn mock_chat_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Chat fails for the first `times` calls, then falls through to later mocks
    pub async fn mock_chat_failures(&self, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // DELETE /conv - Session deletion
    // =========================================================================

    /// Session deletion succeeds with an empty body
    pub async fn mock_delete_session(&self) {
        Mock::given(method("DELETE"))
            .and(path("/conv"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Session deletion fails
    pub async fn mock_delete_session_error(&self) {
        Mock::given(method("DELETE"))
            .and(path("/conv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 404,
                "title": "Not Found",
                "detail": "conversation does not exist"
            })))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Requests received for a method and path
    pub async fn requests_to(&self, http_method: &str, request_path: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == request_path)
            .collect()
    }

    /// Wait until `count` session deletions arrived; teardown is detached
    pub async fn wait_for_deletes(&self, count: usize) -> Vec<Request> {
        for _ in 0..200 {
            let deletes = self.requests_to("DELETE", "/conv").await;
            if deletes.len() >= count {
                return deletes;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} session deletes", count);
    }
}

/// Value of a query parameter on a recorded request
pub fn query_value(request: &Request, name: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
