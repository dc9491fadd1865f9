// src/api/http/retrieval.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use tracing::debug;

use crate::{
    api::error::ApiResult,
    memory::types::RetrievalQuery,
    state::AppState,
};

/// POST /retrieve
///
/// Read-only, budget-constrained retrieval. An unsatisfiable budget returns
/// an empty selection with alternative_available = true, never an error.
pub async fn retrieve(
    State(app): State<Arc<AppState>>,
    Json(query): Json<RetrievalQuery>,
) -> ApiResult<impl IntoResponse> {
    debug!(tags = ?query.tags, strategy = ?query.strategy, "retrieval request");
    let result = app.service.retrieve(&query).await?;
    Ok(Json(result))
}
