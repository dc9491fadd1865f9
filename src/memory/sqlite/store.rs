//! Durable record store over SQLite with a synchronously maintained tag
//! index. Each record row and its record_tags rows commit in a single
//! transaction, so a reader observing a record always observes its index
//! entries too; writes serialize on that transaction, reads run
//! concurrently.

use anyhow::Result;
use chrono::{NaiveDateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::memory::error::{MemoryError, MemoryResult};
use crate::memory::types::Record;

pub struct RecordStore {
    pub pool: SqlitePool,
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        super::migration::run_migrations(&self.pool).await
    }

    /// Inserts or replaces by id, refreshing the tag index in the same
    /// transaction. Rejects empty ids and non-positive token estimates
    /// before touching the database.
    pub async fn put(&self, record: &Record) -> MemoryResult<()> {
        if record.id.trim().is_empty() {
            return Err(MemoryError::Validation("record id must not be empty".into()));
        }
        if record.token_estimate == Some(0) {
            return Err(MemoryError::Validation("token_estimate must be positive".into()));
        }

        let tags_json = serde_json::to_string(&record.tags).unwrap_or_else(|_| "[]".to_string());
        let related_json =
            serde_json::to_string(&record.related_ids).unwrap_or_else(|_| "[]".to_string());
        let entities_json =
            serde_json::to_string(&record.key_entities).unwrap_or_else(|_| "[]".to_string());

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO records (
                id, record_type, created_at, tags, summary,
                token_estimate, source_token_cost, related_ids, key_entities
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.record_type)
        .bind(record.created_at.naive_utc())
        .bind(tags_json)
        .bind(&record.summary)
        .bind(record.token_estimate.map(|v| v as i64))
        .bind(record.source_token_cost.map(|v| v as i64))
        .bind(related_json)
        .bind(entities_json)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM record_tags WHERE record_id = ?")
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;

        for tag in &record.tags {
            sqlx::query("INSERT OR IGNORE INTO record_tags (tag, record_id) VALUES (?, ?)")
                .bind(tag)
                .bind(&record.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(id = %record.id, tags = record.tags.len(), "stored record");
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> MemoryResult<Record> {
        let row = sqlx::query("SELECT * FROM records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Self::row_to_record(&row)),
            None => Err(MemoryError::NotFound(id.to_string())),
        }
    }

    /// Records whose tag set intersects the given tags. An empty tag set
    /// returns nothing rather than scanning the whole corpus.
    pub async fn query_by_tags(&self, tags: &[String]) -> MemoryResult<Vec<Record>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: BTreeMap<String, Record> = BTreeMap::new();
        for tag in tags {
            let rows = sqlx::query(
                r#"
                SELECT r.* FROM records r
                JOIN record_tags t ON t.record_id = r.id
                WHERE t.tag = ?
                "#,
            )
            .bind(tag)
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                let record = Self::row_to_record(&row);
                by_id.entry(record.id.clone()).or_insert(record);
            }
        }

        Ok(by_id.into_values().collect())
    }

    /// Case-insensitive substring scan over summaries, in storage order.
    /// Linear over the corpus; tag queries are the indexed path.
    pub async fn query_by_text(&self, needle: &str) -> MemoryResult<Vec<Record>> {
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("%{escaped}%");

        let rows = sqlx::query(
            "SELECT * FROM records WHERE summary LIKE ? ESCAPE '\\' ORDER BY rowid",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    /// Tag → record count, for discovery/listing.
    pub async fn list_tag_counts(&self) -> MemoryResult<BTreeMap<String, i64>> {
        let rows = sqlx::query("SELECT tag, COUNT(*) AS n FROM record_tags GROUP BY tag")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("tag"), row.get::<i64, _>("n")))
            .collect())
    }

    /// Detects record/index drift. Returns Ok(()) when consistent, the
    /// corruption error otherwise; callers self-heal via rebuild_tag_index.
    pub async fn verify_tag_index(&self) -> MemoryResult<()> {
        // Index rows pointing at missing records, or records whose tags
        // are absent from the index.
        let dangling: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM record_tags t
            WHERE NOT EXISTS (SELECT 1 FROM records r WHERE r.id = t.record_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let mut missing = 0usize;
        for record in self.all_records().await? {
            for tag in &record.tags {
                let present: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM record_tags WHERE tag = ? AND record_id = ?",
                )
                .bind(tag)
                .bind(&record.id)
                .fetch_one(&self.pool)
                .await?;
                if present == 0 {
                    missing += 1;
                }
            }
        }

        if dangling > 0 || missing > 0 {
            return Err(MemoryError::IndexCorruption(format!(
                "{dangling} dangling index rows, {missing} unindexed tags"
            )));
        }
        Ok(())
    }

    /// Repopulates the tag index by full rescan of the records table.
    /// The recovery path for index corruption; idempotent.
    pub async fn rebuild_tag_index(&self) -> MemoryResult<usize> {
        let records = self.all_records().await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM record_tags").execute(&mut *tx).await?;

        let mut rebuilt = 0usize;
        for record in &records {
            for tag in &record.tags {
                sqlx::query("INSERT OR IGNORE INTO record_tags (tag, record_id) VALUES (?, ?)")
                    .bind(tag)
                    .bind(&record.id)
                    .execute(&mut *tx)
                    .await?;
                rebuilt += 1;
            }
        }
        tx.commit().await?;

        info!(records = records.len(), index_rows = rebuilt, "rebuilt tag index");
        Ok(rebuilt)
    }

    /// Verify and, on detected corruption, rebuild. Never surfaces the
    /// corruption to the caller.
    pub async fn heal_tag_index(&self) -> MemoryResult<()> {
        match self.verify_tag_index().await {
            Ok(()) => Ok(()),
            Err(MemoryError::IndexCorruption(detail)) => {
                warn!(%detail, "tag index corruption detected, rebuilding");
                self.rebuild_tag_index().await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn all_records(&self) -> MemoryResult<Vec<Record>> {
        let rows = sqlx::query("SELECT * FROM records ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    fn row_to_record(row: &SqliteRow) -> Record {
        let created_at: NaiveDateTime = row.get("created_at");
        let tags: String = row.get("tags");
        let related_ids: String = row.get("related_ids");
        let key_entities: String = row.get("key_entities");

        Record {
            id: row.get("id"),
            record_type: row.get("record_type"),
            created_at: Utc.from_utc_datetime(&created_at),
            tags: serde_json::from_str(&tags).unwrap_or_default(),
            summary: row.get("summary"),
            token_estimate: row.get::<Option<i64>, _>("token_estimate").map(|v| v as u32),
            source_token_cost: row.get::<Option<i64>, _>("source_token_cost").map(|v| v as u32),
            related_ids: serde_json::from_str(&related_ids).unwrap_or_default(),
            key_entities: serde_json::from_str(&key_entities).unwrap_or_default(),
        }
    }
}
