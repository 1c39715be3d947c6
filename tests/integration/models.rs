//! Models endpoint integration tests
//!
//! Tests for GET /v1/models.

use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::TestHarness;

#[tokio::test]
async fn test_list_models_returns_single_model() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/v1/models").await;

    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["object"], "list");
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], "emohaa");
    assert_eq!(data[0]["object"], "model");
    assert_eq!(data[0]["owned_by"], "emohaa");
    assert!(data[0]["created"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_list_models_needs_no_credential() {
    let harness = TestHarness::new().await;

    harness.server.get("/v1/models").await.assert_status_ok();
    assert!(harness
        .emohaa
        .requests_to("GET", "/generate/id")
        .await
        .is_empty());
}
