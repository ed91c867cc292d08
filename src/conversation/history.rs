//! Per-user conversation memory (process lifetime only)

use std::collections::HashMap;

use crate::ai::ChatTurn;

/// Messages kept per user
pub const MAX_HISTORY: usize = 20;

#[derive(Debug)]
pub struct ConversationHistory {
    max_turns: usize,
    turns: HashMap<i64, Vec<ChatTurn>>,
    /// Bumped by `clear`; turns started under an older generation are dropped
    generations: HashMap<i64, u64>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }

    pub fn with_capacity(max_turns: usize) -> Self {
        Self {
            max_turns,
            turns: HashMap::new(),
            generations: HashMap::new(),
        }
    }

    /// Snapshot for a model call
    pub fn get(&self, user_id: i64) -> Vec<ChatTurn> {
        self.turns.get(&user_id).cloned().unwrap_or_default()
    }

    pub fn len(&self, user_id: i64) -> usize {
        self.turns.get(&user_id).map_or(0, Vec::len)
    }

    /// Current generation for a user; capture before a model call
    pub fn generation(&self, user_id: i64) -> u64 {
        self.generations.get(&user_id).copied().unwrap_or(0)
    }

    /// Record an exchange unless the history was cleared since `generation`
    ///
    /// Returns whether the exchange was kept.
    pub fn record_if_current(&mut self, user_id: i64, generation: u64, user: &str, assistant: &str) -> bool {
        if self.generation(user_id) != generation {
            return false;
        }
        self.record_exchange(user_id, user, assistant);
        true
    }

    /// Record a completed exchange, dropping the oldest turns past the cap
    pub fn record_exchange(&mut self, user_id: i64, user: &str, assistant: &str) {
        let turns = self.turns.entry(user_id).or_default();
        turns.push(ChatTurn::user(user));
        turns.push(ChatTurn::assistant(assistant));
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }
    }

    pub fn clear(&mut self, user_id: i64) {
        self.turns.remove(&user_id);
        *self.generations.entry(user_id).or_insert(0) += 1;
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}
