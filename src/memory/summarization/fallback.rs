// src/memory/summarization/fallback.rs

use async_trait::async_trait;
use std::sync::Arc;

use crate::memory::traits::{Summarizer, TokenEstimator};

/// Extractive fallback: keeps leading whole lines while they fit the target
/// budget, then hard-truncates. No model call involved; useful for local
/// runs and as the default collaborator until a real summarizer is wired in.
pub struct ExtractiveSummarizer {
    estimator: Arc<dyn TokenEstimator>,
}

impl ExtractiveSummarizer {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator }
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, text: &str, target_tokens: u32) -> anyhow::Result<String> {
        let mut out = String::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let candidate = if out.is_empty() {
                line.to_string()
            } else {
                format!("{out} {line}")
            };
            if self.estimator.estimate(&candidate) > target_tokens {
                break;
            }
            out = candidate;
        }

        if out.is_empty() {
            // First line alone exceeds the target; keep a hard prefix.
            let max_chars = (target_tokens as usize).saturating_mul(4).max(1);
            out = text.chars().take(max_chars).collect::<String>().trim().to_string();
        }

        Ok(out)
    }
}
