// src/state.rs
// Shared application state threaded through all axum handlers.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::CONFIG;
use crate::memory::ranking::RankingConfig;
use crate::memory::service::MemoryService;
use crate::memory::sqlite::store::RecordStore;
use crate::memory::summarization::coordinator::SummarizerConfig;
use crate::memory::traits::{Summarizer, TokenEstimator};

pub struct AppState {
    pub service: MemoryService,
}

/// Builds the fully wired state: store (with migrations run), ranking
/// weights from config, and the external collaborators behind their traits.
pub async fn create_app_state(
    pool: SqlitePool,
    summarizer: Arc<dyn Summarizer>,
    estimator: Arc<dyn TokenEstimator>,
) -> Result<AppState> {
    let store = Arc::new(RecordStore::new(pool));
    store.run_migrations().await?;
    store.heal_tag_index().await?;

    let ranking = RankingConfig {
        tag_weight: CONFIG.tag_weight,
        entity_weight: CONFIG.entity_weight,
        recency_weight: CONFIG.recency_weight,
        recency_half_life_hours: CONFIG.recency_half_life_hours,
        default_max_tokens: CONFIG.max_retrieval_tokens,
    };

    let summarizer_config = SummarizerConfig {
        threshold_tokens: CONFIG.summarize_threshold_tokens,
        default_target_tokens: CONFIG.summary_target_tokens,
        call_timeout: std::time::Duration::from_secs(CONFIG.summarizer_timeout_secs),
    };

    let service = MemoryService::new(store, summarizer, estimator, ranking, summarizer_config);

    Ok(AppState { service })
}
