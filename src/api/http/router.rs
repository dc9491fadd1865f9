// src/api/http/router.rs
// HTTP router composition for the memory service endpoints

use axum::{
    Json, Router,
    routing::{get, post},
};
use std::sync::Arc;

use super::{
    records::{get_record, get_tags, store_record},
    retrieval::retrieve,
    summarize::summarize_and_store,
};
use crate::state::AppState;

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Main HTTP router: retrieval, record storage, summarization, discovery.
pub fn http_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_handler))

        // Retrieval
        .route("/retrieve", post(retrieve))

        // Records
        .route("/records", post(store_record))
        .route("/records/{id}", get(get_record))

        // Summarization
        .route("/summarize", post(summarize_and_store))

        // Discovery
        .route("/tags", get(get_tags))

        .with_state(app_state)
}
