// src/memory/summarization/session.rs
// Per-session staging buffer and its lifecycle:
// Accumulating -> PendingSummarization -> Summarized -> Closed

use crate::memory::error::{MemoryError, MemoryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accumulating,
    PendingSummarization,
    Summarized,
    Closed,
}

/// Raw turns accumulated for one logical work unit, with a running token
/// estimate. This buffer is the coordinator's only staging state; it never
/// owns the upstream conversation log.
#[derive(Debug, Clone)]
pub struct SessionBuffer {
    pub session_id: String,
    pub state: SessionState,
    turns: Vec<String>,
    raw_token_estimate: u32,
}

impl SessionBuffer {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: SessionState::Accumulating,
            turns: Vec::new(),
            raw_token_estimate: 0,
        }
    }

    pub fn raw_token_estimate(&self) -> u32 {
        self.raw_token_estimate
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Appends a raw turn; only legal while accumulating.
    pub fn append_turn(&mut self, text: String, turn_tokens: u32) -> MemoryResult<()> {
        if self.state != SessionState::Accumulating {
            return Err(MemoryError::Validation(format!(
                "session {} is {:?}, cannot append",
                self.session_id, self.state
            )));
        }
        self.raw_token_estimate = self.raw_token_estimate.saturating_add(turn_tokens);
        self.turns.push(text);
        Ok(())
    }

    /// Accumulating -> PendingSummarization. Triggered by a threshold
    /// crossing, a manual request, or a checkpoint signal; idempotent when
    /// already pending.
    pub fn mark_pending(&mut self) -> MemoryResult<()> {
        match self.state {
            SessionState::Accumulating | SessionState::PendingSummarization => {
                self.state = SessionState::PendingSummarization;
                Ok(())
            }
            other => Err(MemoryError::Validation(format!(
                "session {} is {:?}, cannot mark pending",
                self.session_id, other
            ))),
        }
    }

    pub fn mark_summarized(&mut self) {
        self.state = SessionState::Summarized;
    }

    /// Summarized -> Closed: the staging buffer is dropped. The raw text is
    /// gone from working state after this; only the summary record remains.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        self.turns.clear();
        self.raw_token_estimate = 0;
    }

    pub fn combined_text(&self) -> String {
        self.turns.join("\n")
    }
}
