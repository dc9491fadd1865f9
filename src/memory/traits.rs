// src/memory/traits.rs
//! Collaborator seams for the external model-facing functions. The core
//! never calls a network directly; it goes through these traits with a
//! caller-supplied timeout.

use async_trait::async_trait;

/// Opaque text summarization: `summarize(text, target_tokens) -> summary`.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, target_tokens: u32) -> anyhow::Result<String>;
}

/// Opaque token-count estimation. Estimates, not guarantees; drift between
/// an estimate and real tokenizer output is expected and tolerated.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> u32;
}
