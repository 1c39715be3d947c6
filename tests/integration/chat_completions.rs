//! Chat completions endpoint integration tests
//!
//! Tests for POST /v1/chat/completions against a mock Emohaa:
//! - Buffered and streaming response shapes
//! - Upstream request construction (query, credential, signature)
//! - Session lifecycle and whole-turn retries
//! - Request validation

use axum::http::StatusCode;
use emohaa_bridge::upstream::signature::sign;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{constants::*, sse_payloads, TestHarness};
use crate::mocks::query_value;

fn hi() -> Value {
    json!({ "messages": [{ "role": "user", "content": "hi" }] })
}

fn hi_stream() -> Value {
    json!({ "messages": [{ "role": "user", "content": "hi" }], "stream": true })
}

// =============================================================================
// Buffered responses
// =============================================================================

#[tokio::test]
async fn test_buffered_completion() {
    let harness = TestHarness::with_session(TEST_SESSION_ID).await;
    harness
        .emohaa
        .mock_chat_stream(&["Hello", " there", "[DONE]"])
        .await;

    let response = harness.authorized_chat().json(&hi()).await;

    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["id"], TEST_SESSION_ID);
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "emohaa");
    assert_eq!(body["choices"][0]["index"], 0);
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello there");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(
        body["usage"],
        json!({ "prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0 })
    );
    assert!(body["created"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_upstream_chat_request_is_signed_and_scoped_to_session() {
    let harness = TestHarness::with_session(TEST_SESSION_ID).await;
    harness.emohaa.mock_chat_stream(&["ok", "[DONE]"]).await;

    let body = json!({
        "messages": [
            { "role": "system", "content": "be kind" },
            { "role": "user", "content": "how are you?" }
        ]
    });
    harness.authorized_chat().json(&body).await.assert_status_ok();

    let chats = harness.emohaa.requests_to("GET", "/chat").await;
    assert_eq!(chats.len(), 1);
    let chat = &chats[0];

    assert_eq!(query_value(chat, "token").as_deref(), Some(TEST_CREDENTIAL));
    assert_eq!(query_value(chat, "cid").as_deref(), Some(TEST_SESSION_ID));
    assert_eq!(query_value(chat, "role").as_deref(), Some("echo"));
    assert_eq!(
        query_value(chat, "prompt").as_deref(),
        Some("system:be kind\nuser:how are you?\n")
    );

    let xts = query_value(chat, "xts").unwrap();
    let xid = query_value(chat, "xid").unwrap();
    assert_eq!(query_value(chat, "xreal").unwrap(), sign(&xts, &xid));
    assert_eq!(chat.headers.get("x-xss-ts").unwrap(), xts.as_str());
    assert_eq!(chat.headers.get("x-xss-id").unwrap(), xid.as_str());

    assert_eq!(
        chat.headers.get("authorization").unwrap(),
        format!("Bearer {}", TEST_CREDENTIAL).as_str()
    );
    assert_eq!(
        chat.headers.get("origin").unwrap(),
        "https://echo.turing-world.com"
    );
}

#[tokio::test]
async fn test_session_is_deleted_after_turn() {
    let harness = TestHarness::with_session(TEST_SESSION_ID).await;
    harness.emohaa.mock_chat_stream(&["Hello", "[DONE]"]).await;

    harness.authorized_chat().json(&hi()).await.assert_status_ok();

    let deletes = harness.emohaa.wait_for_deletes(1).await;
    assert_eq!(query_value(&deletes[0], "cid").as_deref(), Some(TEST_SESSION_ID));
}

#[tokio::test]
async fn test_failed_teardown_does_not_fail_turn() {
    let harness = TestHarness::new().await;
    harness.emohaa.mock_create_session(TEST_SESSION_ID).await;
    harness.emohaa.mock_delete_session_error().await;
    harness.emohaa.mock_chat_stream(&["still fine", "[DONE]"]).await;

    let response = harness.authorized_chat().json(&hi()).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["choices"][0]["message"]["content"], "still fine");
    harness.emohaa.wait_for_deletes(1).await;
}

#[tokio::test]
async fn test_list_content_is_flattened_without_role_prefix() {
    let harness = TestHarness::with_session(TEST_SESSION_ID).await;
    harness.emohaa.mock_chat_stream(&["ok", "[DONE]"]).await;

    let body = json!({
        "messages": [
            { "role": "user", "content": [
                { "type": "text", "text": "look " },
                { "type": "image_url", "image_url": { "url": "https://example.com/a.png" } },
                { "type": "text", "text": "here" }
            ]},
            { "content": "plain" }
        ]
    });
    harness.authorized_chat().json(&body).await.assert_status_ok();

    let chats = harness.emohaa.requests_to("GET", "/chat").await;
    assert_eq!(
        query_value(&chats[0], "prompt").as_deref(),
        Some("look hereuser:plain\n")
    );
}

#[tokio::test]
async fn test_credential_is_chosen_from_list() {
    let harness = TestHarness::with_session(TEST_SESSION_ID).await;
    harness.emohaa.mock_chat_stream(&["ok", "[DONE]"]).await;

    harness
        .chat_request("Bearer token-a,token-b")
        .json(&hi())
        .await
        .assert_status_ok();

    let chats = harness.emohaa.requests_to("GET", "/chat").await;
    let token = query_value(&chats[0], "token").unwrap();
    assert!(token == "token-a" || token == "token-b", "got {}", token);

    // Every upstream call of the turn uses the same credential
    let creates = harness.emohaa.requests_to("GET", "/generate/id").await;
    assert_eq!(
        creates[0].headers.get("authorization").unwrap(),
        format!("Bearer {}", token).as_str()
    );
}

// =============================================================================
// Streaming responses
// =============================================================================

#[tokio::test]
async fn test_streaming_completion_frames() {
    let harness = TestHarness::with_session(TEST_SESSION_ID).await;
    harness
        .emohaa
        .mock_chat_stream(&["Hello", " there", "[DONE]"])
        .await;

    let response = harness.authorized_chat().json(&hi_stream()).await;

    response.assert_status_ok();
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.header("cache-control").to_str().unwrap(), "no-cache");
    assert_eq!(response.header("x-accel-buffering").to_str().unwrap(), "no");

    let payloads = sse_payloads(&response.text());
    assert_eq!(payloads.len(), 5);
    assert_eq!(payloads[4], "[DONE]");

    let frames: Vec<Value> = payloads[..4]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();

    for frame in &frames {
        assert_eq!(frame["id"], TEST_SESSION_ID);
        assert_eq!(frame["object"], "chat.completion.chunk");
        assert_eq!(frame["model"], "emohaa");
    }
    assert_eq!(
        frames[0]["choices"][0]["delta"],
        json!({ "role": "assistant", "content": "" })
    );
    assert_eq!(frames[1]["choices"][0]["delta"]["content"], "Hello");
    assert_eq!(frames[2]["choices"][0]["delta"]["content"], " there");
    assert_eq!(frames[3]["choices"][0]["delta"], json!({}));
    assert_eq!(frames[3]["choices"][0]["finish_reason"], "stop");
    assert_eq!(frames[3]["usage"]["total_tokens"], 0);

    harness.emohaa.wait_for_deletes(1).await;
}

#[tokio::test]
async fn test_streaming_without_sentinel_still_terminates() {
    let harness = TestHarness::with_session(TEST_SESSION_ID).await;
    harness
        .emohaa
        .mock_chat_body("data: partial\n\ndata: cut off".to_string())
        .await;

    let response = harness.authorized_chat().json(&hi_stream()).await;

    response.assert_status_ok();
    let payloads = sse_payloads(&response.text());
    // role-init, one content frame, terminal marker; no finish frame
    assert_eq!(payloads.len(), 3);
    assert_eq!(payloads[2], "[DONE]");
    assert_eq!(
        payloads.iter().filter(|p| p.as_str() == "[DONE]").count(),
        1
    );

    harness.emohaa.wait_for_deletes(1).await;
}

#[tokio::test]
async fn test_streaming_failure_before_first_byte_is_json_error() {
    let harness = TestHarness::with_session(TEST_SESSION_ID).await;
    harness.emohaa.mock_chat_status(503).await;

    let response = harness.authorized_chat().json(&hi_stream()).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");

    // Every attempt's session is torn down
    harness.emohaa.wait_for_deletes(4).await;
}

// =============================================================================
// Retries and upstream errors
// =============================================================================

#[tokio::test]
async fn test_transient_chat_failure_is_retried_with_new_session() {
    let harness = TestHarness::with_session(TEST_SESSION_ID).await;
    harness.emohaa.mock_chat_failures(500, 1).await;
    harness.emohaa.mock_chat_stream(&["recovered", "[DONE]"]).await;

    let response = harness.authorized_chat().json(&hi()).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["choices"][0]["message"]["content"], "recovered");

    let creates = harness.emohaa.requests_to("GET", "/generate/id").await;
    assert_eq!(creates.len(), 2);
    harness.emohaa.wait_for_deletes(2).await;
}

#[tokio::test]
async fn test_structured_error_surfaces_after_four_attempts() {
    let harness = TestHarness::new().await;
    harness
        .emohaa
        .mock_create_session_error(401, "Unauthorized", "token expired")
        .await;

    let response = harness.authorized_chat().json(&hi()).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "API_REQUEST_FAILED");
    assert_eq!(
        body["error"]["message"],
        "[Request to emohaa failed]: [401] Unauthorized token expired"
    );

    let creates = harness.emohaa.requests_to("GET", "/generate/id").await;
    assert_eq!(creates.len(), 4);
    assert!(harness.emohaa.requests_to("GET", "/chat").await.is_empty());
}

// =============================================================================
// Request validation
// =============================================================================

#[tokio::test]
async fn test_missing_authorization_is_rejected() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&hi())
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert!(harness.emohaa.requests_to("GET", "/generate/id").await.is_empty());
}

#[tokio::test]
async fn test_blank_credential_list_is_rejected() {
    let harness = TestHarness::new().await;

    let response = harness.chat_request("Bearer , ,").json(&hi()).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bare_bearer_scheme_is_rejected() {
    let harness = TestHarness::new().await;

    for authorization in ["Bearer", "Bearer "] {
        let response = harness.chat_request(authorization).json(&hi()).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }
    assert!(harness.emohaa.requests_to("GET", "/generate/id").await.is_empty());
}

#[tokio::test]
async fn test_missing_messages_is_bad_request() {
    let harness = TestHarness::new().await;

    let response = harness
        .authorized_chat()
        .json(&json!({ "stream": false }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_messages_must_be_an_array() {
    let harness = TestHarness::new().await;

    let response = harness
        .authorized_chat()
        .json(&json!({ "messages": "hi" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_is_not_allowed() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/v1/chat/completions").await;

    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
}
