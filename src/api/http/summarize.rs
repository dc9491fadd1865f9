// src/api/http/summarize.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    api::error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SummarizePayload {
    pub raw_text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub target_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct SummarizeOk {
    id: String,
    token_estimate: u32,
}

/// POST /summarize
///
/// Synchronously summarizes raw text through the external collaborator and
/// stores the derived record. Collaborator failure or timeout maps to 502;
/// nothing is written in that case.
pub async fn summarize_and_store(
    State(app): State<Arc<AppState>>,
    Json(payload): Json<SummarizePayload>,
) -> ApiResult<impl IntoResponse> {
    if payload.raw_text.trim().is_empty() {
        return Err(ApiError::bad_request("raw_text must not be empty"));
    }

    let record = app
        .service
        .summarize_and_store(&payload.raw_text, payload.tags, payload.target_tokens)
        .await?;

    info!(
        id = %record.id,
        token_estimate = record.token_estimate.unwrap_or(0),
        source_token_cost = record.source_token_cost.unwrap_or(0),
        "summarized and stored"
    );

    Ok(Json(SummarizeOk {
        token_estimate: record.token_estimate.unwrap_or(0),
        id: record.id,
    }))
}
