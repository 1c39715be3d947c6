//! Models endpoint
//!
//! The bridge serves exactly one model, the configured Emohaa persona.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, AppState};

/// Vendor reported as the model owner
const MODEL_OWNER: &str = "emohaa";

/// Model information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

/// Models list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<Model>,
}

/// List available models
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> AppResult<(StatusCode, Json<ModelsResponse>)> {
    let model = Model {
        id: state.bridge.model().to_string(),
        object: "model".to_string(),
        created: state.started_at,
        owned_by: MODEL_OWNER.to_string(),
    };

    let response = ModelsResponse {
        object: "list".to_string(),
        data: vec![model],
    };

    Ok((StatusCode::OK, Json(response)))
}
