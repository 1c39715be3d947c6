//! Chat completions endpoint
//!
//! OpenAI-compatible chat completions backed by Emohaa.
//! Handles both streaming and non-streaming responses.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use crate::{
    bridge::{select_credential, split_credentials, ChatCompletionRequest},
    error::AppError,
    routes::metrics::record_request,
    AppState,
};

/// Pick the upstream credential for this request from the bearer header
fn credential_from_headers(headers: &HeaderMap) -> Result<String, AppError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let candidates = split_credentials(authorization);
    select_credential(&candidates)
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

/// Handle chat completion requests
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let start_time = Instant::now();

    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;

    let credential = credential_from_headers(&headers).inspect_err(|_| {
        warn!("Chat completion request without a usable credential");
    })?;

    info!(
        stream = %request.stream,
        messages = %request.messages.len(),
        use_search = %request.use_search,
        "Processing chat completion request"
    );

    if request.stream {
        handle_streaming_chat(state, request, credential, start_time).await
    } else {
        handle_non_streaming_chat(state, request, credential, start_time).await
    }
}

/// Handle non-streaming chat completion
async fn handle_non_streaming_chat(
    state: Arc<AppState>,
    request: ChatCompletionRequest,
    credential: String,
    start_time: Instant,
) -> Result<Response, AppError> {
    let result = state.bridge.complete(&request.messages, &credential).await;
    let duration = start_time.elapsed().as_secs_f64();

    let completion = result.inspect_err(|_| record_request("buffered", "error", duration))?;
    record_request("buffered", "success", duration);

    info!(
        completion_id = %completion.id,
        duration_ms = %format!("{:.2}", duration * 1000.0),
        "Chat completion request completed"
    );

    Ok((StatusCode::OK, Json(completion)).into_response())
}

/// Handle streaming chat completion
async fn handle_streaming_chat(
    state: Arc<AppState>,
    request: ChatCompletionRequest,
    credential: String,
    start_time: Instant,
) -> Result<Response, AppError> {
    let result = state
        .bridge
        .complete_stream(&request.messages, &credential)
        .await;
    let duration = start_time.elapsed().as_secs_f64();

    let frames = result.inspect_err(|_| record_request("streaming", "error", duration))?;

    // Final stream outcome is logged by the bridge when the transfer ends
    record_request("streaming", "success", duration);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(frames))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))?;

    Ok(response)
}
