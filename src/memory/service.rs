// src/memory/service.rs

//! Facade over store, ranking, summarization, and accounting; the four
//! external operations all pass through here.

use std::sync::Arc;
use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::memory::accounting::{AccountingLog, AccountingRollup};
use crate::memory::error::{MemoryError, MemoryResult};
use crate::memory::ranking::{RankingConfig, rank_and_select};
use crate::memory::sqlite::store::RecordStore;
use crate::memory::summarization::coordinator::{SummarizerConfig, SummarizerCoordinator};
use crate::memory::summarization::session::SessionState;
use crate::memory::traits::{Summarizer, TokenEstimator};
use crate::memory::types::{Record, RecordInput, RetrievalQuery, RetrievalResult};

pub struct MemoryService {
    store: Arc<RecordStore>,
    accounting: AccountingLog,
    coordinator: SummarizerCoordinator,
    ranking: RankingConfig,
}

impl MemoryService {
    pub fn new(
        store: Arc<RecordStore>,
        summarizer: Arc<dyn Summarizer>,
        estimator: Arc<dyn TokenEstimator>,
        ranking: RankingConfig,
        summarizer_config: SummarizerConfig,
    ) -> Self {
        let accounting = AccountingLog::new(store.pool.clone());
        let coordinator =
            SummarizerCoordinator::new(store.clone(), summarizer, estimator, summarizer_config);
        Self {
            store,
            accounting,
            coordinator,
            ranking,
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &SummarizerCoordinator {
        &self.coordinator
    }

    pub fn accounting(&self) -> &AccountingLog {
        &self.accounting
    }

    /// Budget-constrained retrieval. Read-only against the store; safe to
    /// cancel at any point. Accounting failures are logged, never allowed
    /// to fail the retrieval itself.
    pub async fn retrieve(&self, query: &RetrievalQuery) -> MemoryResult<RetrievalResult> {
        let started = Instant::now();

        // Candidate generation: tag matches unioned with text matches.
        let mut candidates = self.store.query_by_tags(&query.tags).await?;
        if let Some(ref needle) = query.free_text {
            candidates.extend(self.store.query_by_text(needle).await?);
        }

        // Savings estimate spans every candidate carrying a source cost,
        // selected or not.
        let equivalent_raw_tokens: u32 = {
            let mut seen = std::collections::HashSet::new();
            candidates
                .iter()
                .filter(|r| seen.insert(r.id.clone()))
                .filter_map(|r| r.source_token_cost)
                .sum()
        };

        let result = rank_and_select(candidates, query, chrono::Utc::now(), &self.ranking);
        let latency_ms = started.elapsed().as_millis() as u64;

        debug!(
            returned = result.records.len(),
            total_tokens = result.total_tokens_retrieved,
            latency_ms,
            "retrieval complete"
        );

        if let Err(err) = self
            .accounting
            .record_retrieval(
                &query.tags,
                result.records.len() as u32,
                result.total_tokens_retrieved,
                equivalent_raw_tokens,
                latency_ms,
            )
            .await
        {
            warn!(%err, "failed to append retrieval accounting entry");
        }

        Ok(result)
    }

    /// Stores a pre-formed record; the store assigns the id.
    pub async fn store_record(&self, input: RecordInput) -> MemoryResult<String> {
        input.validate()?;
        let record = Record::from_input(input, Uuid::new_v4().to_string());
        self.store.put(&record).await?;
        info!(id = %record.id, record_type = %record.record_type, "record stored");
        Ok(record.id)
    }

    pub async fn get_record(&self, id: &str) -> MemoryResult<Record> {
        self.store.get_by_id(id).await
    }

    /// Summarizes raw text through the external collaborator and stores the
    /// derived record, logging the token-saving delta.
    pub async fn summarize_and_store(
        &self,
        raw_text: &str,
        tags: Vec<String>,
        target_tokens: Option<u32>,
    ) -> MemoryResult<Record> {
        let started = Instant::now();
        let record = self
            .coordinator
            .summarize_and_store(raw_text, tags, target_tokens)
            .await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        if let Err(err) = self
            .accounting
            .record_summarization(
                &record.tags,
                record.token_estimate.unwrap_or(0),
                record.source_token_cost.unwrap_or(0),
                latency_ms,
            )
            .await
        {
            warn!(%err, "failed to append summarization accounting entry");
        }

        Ok(record)
    }

    /// Tag discovery: tag -> count of records carrying it.
    pub async fn list_available(&self) -> MemoryResult<BTreeMap<String, i64>> {
        self.store.list_tag_counts().await
    }

    pub async fn rollup_since(
        &self,
        since: chrono::DateTime<chrono::Utc>,
    ) -> MemoryResult<AccountingRollup> {
        self.accounting.rollup_since(since).await
    }

    // ── Session lifecycle passthroughs ──

    pub async fn append_turn(&self, session_id: &str, text: &str) -> MemoryResult<SessionState> {
        self.coordinator.append_turn(session_id, text).await
    }

    pub async fn checkpoint(&self, session_id: &str) -> MemoryResult<SessionState> {
        self.coordinator.checkpoint(session_id).await
    }

    pub async fn summarize_session(
        &self,
        session_id: &str,
        tags: Vec<String>,
        target_tokens: Option<u32>,
    ) -> MemoryResult<Record> {
        let started = Instant::now();
        let record = self
            .coordinator
            .summarize_session(session_id, tags, target_tokens)
            .await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        if let Err(err) = self
            .accounting
            .record_summarization(
                &record.tags,
                record.token_estimate.unwrap_or(0),
                record.source_token_cost.unwrap_or(0),
                latency_ms,
            )
            .await
        {
            warn!(%err, "failed to append summarization accounting entry");
        }
        Ok(record)
    }

    /// Startup/maintenance hook: verify the tag index and rebuild on drift.
    pub async fn heal_indexes(&self) -> MemoryResult<()> {
        self.store.heal_tag_index().await
    }
}

impl MemoryService {
    /// Convenience check used by handlers: map a NotFound error into an
    /// Option for lookups that tolerate absence.
    pub async fn try_get_record(&self, id: &str) -> MemoryResult<Option<Record>> {
        match self.store.get_by_id(id).await {
            Ok(record) => Ok(Some(record)),
            Err(MemoryError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
