// src/memory/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::error::MemoryError;

/// Primary persisted unit: a compact summary with a known token cost.
///
/// Records are never hard-deleted; staleness is expressed by removing tags
/// (e.g. `active_session`) so the audit trail survives supersession.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Unique identifier, immutable once assigned by the store.
    pub id: String,
    /// Open classification, e.g. "workflow_summary", "conversation_summary".
    pub record_type: String,
    /// Immutable creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Indexed lookup tags; mutable only via whole-record replacement.
    pub tags: Vec<String>,
    /// Bounded summary text.
    pub summary: String,
    /// Cost of including this summary in a result set. A record without an
    /// estimate is excluded from budget selection (treated as infinite cost).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_estimate: Option<u32>,
    /// Cost the raw artifact would have incurred. Savings accounting only,
    /// never consulted during selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_token_cost: Option<u32>,
    /// Weak references to other records; dangling ids are tolerated.
    #[serde(default)]
    pub related_ids: Vec<String>,
    /// Secondary ranking signal.
    #[serde(default)]
    pub key_entities: Vec<String>,
}

impl Record {
    /// Materialize a submitted input into a stored record with a fresh id.
    pub fn from_input(input: RecordInput, id: String) -> Self {
        Self {
            id,
            record_type: input.record_type,
            created_at: Utc::now(),
            tags: input.tags,
            summary: input.summary,
            token_estimate: input.token_estimate.and_then(|v| u32::try_from(v).ok()),
            source_token_cost: input.source_token_cost.and_then(|v| u32::try_from(v).ok()),
            related_ids: input.related_ids,
            key_entities: input.key_entities,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Caller-submitted record shape: no id (the store assigns one) and raw
/// signed token fields so negative or oversized garbage is rejected by
/// validation instead of a type-level decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordInput {
    pub record_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub token_estimate: Option<i64>,
    #[serde(default)]
    pub source_token_cost: Option<i64>,
    #[serde(default)]
    pub related_ids: Vec<String>,
    #[serde(default)]
    pub key_entities: Vec<String>,
}

impl RecordInput {
    /// Reject malformed input before any store mutation.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.record_type.trim().is_empty() {
            return Err(MemoryError::Validation("record_type must not be empty".into()));
        }
        if let Some(est) = self.token_estimate {
            if est <= 0 || est > i64::from(u32::MAX) {
                return Err(MemoryError::Validation(format!(
                    "token_estimate out of range, got {est}"
                )));
            }
        }
        if let Some(cost) = self.source_token_cost {
            if cost <= 0 || cost > i64::from(u32::MAX) {
                return Err(MemoryError::Validation(format!(
                    "source_token_cost out of range, got {cost}"
                )));
            }
        }
        Ok(())
    }
}

/// Ranking function selector for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Weighted tag/entity overlap with recency as tiebreaker.
    #[default]
    Relevance,
    /// Newest first, relevance ignored.
    Recency,
    /// Cheapest first: maximizes record count per budget.
    LowestCost,
}

/// Ephemeral retrieval request; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalQuery {
    #[serde(default)]
    pub tags: Vec<String>,
    /// Case-insensitive substring match against record summaries.
    #[serde(default)]
    pub free_text: Option<String>,
    /// Token budget; falls back to the configured ceiling when absent.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Record-count cap, independent of the token budget. Both constraints
    /// apply; whichever binds first stops selection.
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub strategy: Strategy,
}

impl RetrievalQuery {
    pub fn by_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            free_text: None,
            max_tokens: None,
            limit: None,
            strategy: Strategy::Relevance,
        }
    }
}

/// Ephemeral retrieval outcome, most relevant record first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub records: Vec<Record>,
    /// Sum of token_estimate over the selected records.
    pub total_tokens_retrieved: u32,
    /// True iff at least one candidate was excluded solely because admitting
    /// it would have exceeded max_tokens or limit.
    pub alternative_available: bool,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total_tokens_retrieved: 0,
            alternative_available: false,
        }
    }
}
