// src/memory/sqlite/migration.rs
//! Handles migrations for SQLite: ensures record and index tables match the
//! latest schema. Run this at startup to guarantee schema compatibility.
use anyhow::Result;
use sqlx::{Executor, SqlitePool};

/// Latest schema for records. Tag/entity sets are JSON text columns; the
/// queryable tag index lives in record_tags and is rebuildable from here.
const CREATE_RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    record_type TEXT NOT NULL,
    created_at DATETIME NOT NULL,
    tags TEXT NOT NULL,
    summary TEXT NOT NULL,
    token_estimate INTEGER,
    source_token_cost INTEGER,
    related_ids TEXT NOT NULL,
    key_entities TEXT NOT NULL
);
"#;

/// Tag index: one row per (tag, record). Maintained in the same transaction
/// as every record write and fully derivable from records.tags.
const CREATE_RECORD_TAGS: &str = r#"
CREATE TABLE IF NOT EXISTS record_tags (
    tag TEXT NOT NULL,
    record_id TEXT NOT NULL,
    PRIMARY KEY (tag, record_id)
);
"#;

/// Append-only event ledger for retrieval/summarization accounting.
const CREATE_ACCOUNTING_LOG: &str = r#"
CREATE TABLE IF NOT EXISTS accounting_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp DATETIME NOT NULL,
    event TEXT NOT NULL,
    query_tags TEXT NOT NULL,
    records_returned INTEGER NOT NULL,
    tokens_returned INTEGER NOT NULL,
    equivalent_raw_tokens INTEGER NOT NULL,
    tokens_saved INTEGER NOT NULL,
    latency_ms INTEGER NOT NULL
);
"#;

/// Create indices for performance
const CREATE_INDICES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_record_tags_tag ON record_tags(tag);
CREATE INDEX IF NOT EXISTS idx_record_tags_record ON record_tags(record_id);
CREATE INDEX IF NOT EXISTS idx_records_type ON records(record_type);
CREATE INDEX IF NOT EXISTS idx_accounting_timestamp ON accounting_log(timestamp);
"#;

/// Runs all required migrations for the SQLite backend.
/// Safe to call at every startup (idempotent).
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    pool.execute(CREATE_RECORDS).await?;
    pool.execute(CREATE_RECORD_TAGS).await?;
    pool.execute(CREATE_ACCOUNTING_LOG).await?;
    pool.execute(CREATE_INDICES).await?;

    Ok(())
}
