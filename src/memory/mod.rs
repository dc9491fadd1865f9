//! Token-budget memory module
//!
//! - Types: records, retrieval queries/results
//! - Sqlite: durable record store with a maintained tag index
//! - Ranking: pure budget-constrained selection engine
//! - Summarization: session lifecycle and coordinator
//! - Accounting: append-only savings ledger with rollups

pub mod accounting;
pub mod error;
pub mod estimator;
pub mod ranking;
pub mod service;
pub mod sqlite;
pub mod summarization;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use self::error::{MemoryError, MemoryResult};
pub use self::ranking::{RankingConfig, rank_and_select};
pub use self::service::MemoryService;
pub use self::sqlite::store::RecordStore;
pub use self::summarization::coordinator::SummarizerConfig;
pub use self::traits::{Summarizer, TokenEstimator};
pub use self::types::*;
