// src/memory/estimator.rs

use crate::memory::traits::TokenEstimator;

/// Character-count heuristic (~4 chars per token, floor of 1 for non-empty
/// text). Good enough for budget bookkeeping when no real tokenizer is
/// wired in; swap in a model-backed estimator behind the same trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> u32 {
        let chars = text.chars().count() as u32;
        chars.div_ceil(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_free() {
        assert_eq!(HeuristicEstimator.estimate(""), 0);
    }

    #[test]
    fn short_text_costs_at_least_one() {
        assert_eq!(HeuristicEstimator.estimate("hi"), 1);
    }

    #[test]
    fn scales_with_length() {
        let text = "a".repeat(400);
        assert_eq!(HeuristicEstimator.estimate(&text), 100);
    }
}
