//! Bounded per-session conversation history.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One completed question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub sql: String,
    pub result_summary: String,
}

/// Ring of the last N turns. Appended only after a successful run, so
/// failed attempts never pollute follow-up prompts.
#[derive(Debug, Clone)]
pub struct ConversationState {
    turns: VecDeque<Turn>,
    cap: usize,
}

impl ConversationState {
    pub fn new(cap: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, turn: Turn) {
        if self.cap == 0 {
            return;
        }
        while self.turns.len() >= self.cap {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(q: &str) -> Turn {
        Turn {
            question: q.to_string(),
            sql: "SELECT 1".to_string(),
            result_summary: "1 row".to_string(),
        }
    }

    #[test]
    fn test_window_drops_oldest() {
        let mut state = ConversationState::new(2);
        state.push(turn("first"));
        state.push(turn("second"));
        state.push(turn("third"));

        let questions: Vec<&str> = state.turns().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["second", "third"]);
    }

    #[test]
    fn test_zero_cap_keeps_nothing() {
        let mut state = ConversationState::new(0);
        state.push(turn("anything"));
        assert!(state.is_empty());
    }
}
