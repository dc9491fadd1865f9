// src/api/http/records.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use tracing::info;

use crate::{
    api::error::{ApiError, ApiResult},
    memory::types::RecordInput,
    state::AppState,
};

#[derive(Debug, Serialize)]
struct StoredOk {
    id: String,
}

#[derive(Debug, Serialize)]
struct TagListing {
    tags: BTreeMap<String, i64>,
}

/// POST /records
///
/// Accepts a pre-formed record without an id; the store assigns one.
/// Malformed input (empty type, non-positive token counts) is rejected
/// before any mutation.
pub async fn store_record(
    State(app): State<Arc<AppState>>,
    Json(input): Json<RecordInput>,
) -> ApiResult<impl IntoResponse> {
    let id = app.service.store_record(input).await?;
    info!(%id, "stored record via API");
    Ok(Json(StoredOk { id }))
}

/// GET /records/{id}
pub async fn get_record(
    State(app): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    match app.service.try_get_record(&id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::not_found(format!("record {id} not found"))),
    }
}

/// GET /tags
///
/// Tag discovery: mapping from tag to the count of records carrying it.
pub async fn get_tags(State(app): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let tags = app.service.list_available().await?;
    Ok(Json(TagListing { tags }))
}
