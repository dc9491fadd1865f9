// src/memory/summarization/coordinator.rs

//! Decides when raw session state becomes a summary record, drives the
//! external summarizer, and retires superseded state by tag removal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::memory::error::{MemoryError, MemoryResult};
use crate::memory::sqlite::store::RecordStore;
use crate::memory::traits::{Summarizer, TokenEstimator};
use crate::memory::types::Record;
use crate::memory::summarization::session::{SessionBuffer, SessionState};

/// Tag carried by the current summary of a live session; stripped from
/// superseded records instead of deleting them.
pub const ACTIVE_SESSION_TAG: &str = "active_session";

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Running raw estimate at which a session goes pending automatically.
    pub threshold_tokens: u32,
    /// Target size handed to the external summarizer when the caller gives none.
    pub default_target_tokens: u32,
    /// Ceiling on a single external summarizer call.
    pub call_timeout: Duration,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            threshold_tokens: 1500,
            default_target_tokens: 64,
            call_timeout: Duration::from_secs(30),
        }
    }
}

pub struct SummarizerCoordinator {
    store: Arc<RecordStore>,
    summarizer: Arc<dyn Summarizer>,
    estimator: Arc<dyn TokenEstimator>,
    sessions: Mutex<HashMap<String, SessionBuffer>>,
    config: SummarizerConfig,
}

impl SummarizerCoordinator {
    pub fn new(
        store: Arc<RecordStore>,
        summarizer: Arc<dyn Summarizer>,
        estimator: Arc<dyn TokenEstimator>,
        config: SummarizerConfig,
    ) -> Self {
        Self {
            store,
            summarizer,
            estimator,
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Appends a raw turn to the session's staging buffer, creating the
    /// session on first use. Crossing the configured threshold moves the
    /// session to pending; it is not summarized until explicitly driven.
    pub async fn append_turn(&self, session_id: &str, text: &str) -> MemoryResult<SessionState> {
        let turn_tokens = self.estimator.estimate(text);
        let mut sessions = self.sessions.lock().await;
        let buffer = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionBuffer::new(session_id));

        buffer.append_turn(text.to_string(), turn_tokens)?;

        if buffer.raw_token_estimate() >= self.config.threshold_tokens {
            buffer.mark_pending()?;
            info!(
                session_id,
                raw_tokens = buffer.raw_token_estimate(),
                "session crossed summarization threshold"
            );
        }

        Ok(buffer.state)
    }

    /// Caller-signaled checkpoint (e.g. analysis complete): Accumulating ->
    /// PendingSummarization regardless of the running estimate.
    pub async fn checkpoint(&self, session_id: &str) -> MemoryResult<SessionState> {
        let mut sessions = self.sessions.lock().await;
        let buffer = sessions
            .get_mut(session_id)
            .ok_or_else(|| MemoryError::NotFound(format!("session {session_id}")))?;
        buffer.mark_pending()?;
        Ok(buffer.state)
    }

    pub async fn session_state(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.lock().await.get(session_id).map(|b| b.state)
    }

    /// Summarizes a pending (or still-accumulating, as a manual trigger)
    /// session into a record and closes the session.
    ///
    /// On collaborator failure or timeout the session stays pending and the
    /// buffer is preserved for retry; nothing is written to the store. The
    /// record commits only after the summarizer call fully returns, so a
    /// cancelled call never leaves a partial record.
    pub async fn summarize_session(
        &self,
        session_id: &str,
        tags: Vec<String>,
        target_tokens: Option<u32>,
    ) -> MemoryResult<Record> {
        // Snapshot the buffer under the lock, then call out without holding it.
        let (raw_text, raw_tokens) = {
            let mut sessions = self.sessions.lock().await;
            let buffer = sessions
                .get_mut(session_id)
                .ok_or_else(|| MemoryError::NotFound(format!("session {session_id}")))?;
            if buffer.turn_count() == 0 {
                return Err(MemoryError::Validation(format!(
                    "session {session_id} has no accumulated turns"
                )));
            }
            buffer.mark_pending()?;
            (buffer.combined_text(), buffer.raw_token_estimate())
        };

        let mut record_tags = tags;
        record_tags.push(format!("session:{session_id}"));
        record_tags.push(ACTIVE_SESSION_TAG.to_string());

        let record = self
            .summarize_text(
                &raw_text,
                raw_tokens,
                "conversation_summary",
                record_tags,
                target_tokens,
            )
            .await?;

        // Success: retire the staging buffer and strip the active tag from
        // whatever this record supersedes. The buffer entry is removed so a
        // later accumulation under the same session id starts fresh and
        // supersedes this summary in turn.
        self.retire_superseded(session_id, &record.id).await?;
        {
            let mut sessions = self.sessions.lock().await;
            if let Some(mut buffer) = sessions.remove(session_id) {
                buffer.mark_summarized();
                buffer.close();
            }
        }

        info!(
            session_id,
            record_id = %record.id,
            raw_tokens,
            summary_tokens = record.token_estimate.unwrap_or(0),
            "session summarized and closed"
        );
        Ok(record)
    }

    /// One-shot path: summarize arbitrary raw text and store the derived
    /// record, without session staging.
    pub async fn summarize_and_store(
        &self,
        raw_text: &str,
        tags: Vec<String>,
        target_tokens: Option<u32>,
    ) -> MemoryResult<Record> {
        if raw_text.trim().is_empty() {
            return Err(MemoryError::Validation("raw_text must not be empty".into()));
        }
        let raw_tokens = self.estimator.estimate(raw_text);
        self.summarize_text(raw_text, raw_tokens, "workflow_summary", tags, target_tokens)
            .await
    }

    async fn summarize_text(
        &self,
        raw_text: &str,
        raw_tokens: u32,
        record_type: &str,
        tags: Vec<String>,
        target_tokens: Option<u32>,
    ) -> MemoryResult<Record> {
        let target = target_tokens.unwrap_or(self.config.default_target_tokens);

        let summary = match tokio::time::timeout(
            self.config.call_timeout,
            self.summarizer.summarize(raw_text, target),
        )
        .await
        {
            Ok(Ok(summary)) => summary,
            Ok(Err(err)) => {
                warn!(%err, "external summarizer failed; raw buffer preserved");
                return Err(MemoryError::SummarizationFailed(err.to_string()));
            }
            Err(_) => {
                warn!(timeout = ?self.config.call_timeout, "external summarizer timed out");
                return Err(MemoryError::SummarizationFailed(format!(
                    "summarizer timed out after {:?}",
                    self.config.call_timeout
                )));
            }
        };

        let record = Record {
            id: Uuid::new_v4().to_string(),
            record_type: record_type.to_string(),
            created_at: Utc::now(),
            tags,
            token_estimate: Some(self.estimator.estimate(&summary).max(1)),
            source_token_cost: Some(raw_tokens.max(1)),
            related_ids: Vec::new(),
            summary,
            key_entities: Vec::new(),
        };

        self.store.put(&record).await?;
        Ok(record)
    }

    /// Removes the active tag from older records of the same session; the
    /// superseded records stay queryable for auditability. Whole-record
    /// read-modify-write, per the store contract.
    async fn retire_superseded(&self, session_id: &str, new_record_id: &str) -> MemoryResult<()> {
        let session_tag = format!("session:{session_id}");
        let candidates = self.store.query_by_tags(&[session_tag]).await?;

        for old in candidates {
            if old.id == new_record_id || !old.has_tag(ACTIVE_SESSION_TAG) {
                continue;
            }
            let mut updated = old.clone();
            updated.tags.retain(|t| t != ACTIVE_SESSION_TAG);
            self.store.put(&updated).await?;
            info!(superseded = %old.id, by = %new_record_id, "retired stale session summary");
        }

        // Link back to what this record replaced.
        let mut fresh = self.store.get_by_id(new_record_id).await?;
        let superseded: Vec<String> = self
            .store
            .query_by_tags(&[format!("session:{session_id}")])
            .await?
            .into_iter()
            .filter(|r| r.id != new_record_id)
            .map(|r| r.id)
            .collect();
        if !superseded.is_empty() {
            fresh.related_ids = superseded;
            self.store.put(&fresh).await?;
        }
        Ok(())
    }
}
