// src/memory/error.rs

/// Memory operation error taxonomy.
///
/// There is deliberately no budget-exceeded variant: exceeding the token
/// budget is a normal retrieval outcome (`alternative_available`), never a
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("summarization failed: {0}")]
    SummarizationFailed(String),

    /// Detected mismatch between the tag index and record contents.
    /// Recovered by full rescan, never surfaced as a caller-facing crash.
    #[error("tag index corruption: {0}")]
    IndexCorruption(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type MemoryResult<T> = Result<T, MemoryError>;
