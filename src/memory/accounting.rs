// src/memory/accounting.rs
// Append-only ledger of retrieval/summarization events with token-saving
// deltas, plus periodic rollups for monitoring.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::memory::error::MemoryResult;

/// One ledger entry; immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingEntry {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub query_tags: Vec<String>,
    pub records_returned: u32,
    pub tokens_returned: u32,
    /// Sum of source_token_cost over candidates that carried one; the cost
    /// the caller would have paid reading raw artifacts instead.
    pub equivalent_raw_tokens: u32,
    pub tokens_saved: u32,
    pub latency_ms: u64,
}

/// Aggregate view over a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingRollup {
    pub events: u32,
    pub records_returned: u32,
    pub tokens_returned: u32,
    pub tokens_saved: u32,
    pub mean_latency_ms: f64,
}

#[derive(Clone)]
pub struct AccountingLog {
    pool: SqlitePool,
}

impl AccountingLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record_retrieval(
        &self,
        query_tags: &[String],
        records_returned: u32,
        tokens_returned: u32,
        equivalent_raw_tokens: u32,
        latency_ms: u64,
    ) -> MemoryResult<()> {
        self.append(
            "retrieval",
            query_tags,
            records_returned,
            tokens_returned,
            equivalent_raw_tokens,
            latency_ms,
        )
        .await
    }

    pub async fn record_summarization(
        &self,
        tags: &[String],
        summary_tokens: u32,
        source_tokens: u32,
        latency_ms: u64,
    ) -> MemoryResult<()> {
        self.append("summarization", tags, 1, summary_tokens, source_tokens, latency_ms)
            .await
    }

    async fn append(
        &self,
        event: &str,
        query_tags: &[String],
        records_returned: u32,
        tokens_returned: u32,
        equivalent_raw_tokens: u32,
        latency_ms: u64,
    ) -> MemoryResult<()> {
        let tags_json = serde_json::to_string(query_tags).unwrap_or_else(|_| "[]".to_string());
        let tokens_saved = equivalent_raw_tokens.saturating_sub(tokens_returned);

        sqlx::query(
            r#"
            INSERT INTO accounting_log (
                timestamp, event, query_tags, records_returned,
                tokens_returned, equivalent_raw_tokens, tokens_saved, latency_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Utc::now().naive_utc())
        .bind(event)
        .bind(tags_json)
        .bind(records_returned as i64)
        .bind(tokens_returned as i64)
        .bind(equivalent_raw_tokens as i64)
        .bind(tokens_saved as i64)
        .bind(latency_ms as i64)
        .execute(&self.pool)
        .await?;

        debug!(event, tokens_returned, tokens_saved, "accounting entry appended");
        Ok(())
    }

    pub async fn entries_since(&self, since: DateTime<Utc>) -> MemoryResult<Vec<AccountingEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM accounting_log WHERE timestamp >= ? ORDER BY timestamp, id",
        )
        .bind(since.naive_utc())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let timestamp: NaiveDateTime = row.get("timestamp");
                let query_tags: String = row.get("query_tags");
                AccountingEntry {
                    timestamp: Utc.from_utc_datetime(&timestamp),
                    event: row.get("event"),
                    query_tags: serde_json::from_str(&query_tags).unwrap_or_default(),
                    records_returned: row.get::<i64, _>("records_returned") as u32,
                    tokens_returned: row.get::<i64, _>("tokens_returned") as u32,
                    equivalent_raw_tokens: row.get::<i64, _>("equivalent_raw_tokens") as u32,
                    tokens_saved: row.get::<i64, _>("tokens_saved") as u32,
                    latency_ms: row.get::<i64, _>("latency_ms") as u64,
                }
            })
            .collect())
    }

    /// Aggregates all entries at or after `since`.
    pub async fn rollup_since(&self, since: DateTime<Utc>) -> MemoryResult<AccountingRollup> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS events,
                COALESCE(SUM(records_returned), 0) AS records_returned,
                COALESCE(SUM(tokens_returned), 0) AS tokens_returned,
                COALESCE(SUM(tokens_saved), 0) AS tokens_saved,
                COALESCE(AVG(latency_ms), 0.0) AS mean_latency_ms
            FROM accounting_log
            WHERE timestamp >= ?
            "#,
        )
        .bind(since.naive_utc())
        .fetch_one(&self.pool)
        .await?;

        Ok(AccountingRollup {
            events: row.get::<i64, _>("events") as u32,
            records_returned: row.get::<i64, _>("records_returned") as u32,
            tokens_returned: row.get::<i64, _>("tokens_returned") as u32,
            tokens_saved: row.get::<i64, _>("tokens_saved") as u32,
            mean_latency_ms: row.get::<f64, _>("mean_latency_ms"),
        })
    }
}
