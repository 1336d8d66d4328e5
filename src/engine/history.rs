//! Bounded round history.
//!
//! Keeps the most recent `capacity` rounds. `first()` is the newest round,
//! `last()` the oldest still retained.

use std::collections::VecDeque;

use crate::types::RoundRecord;

pub const DEFAULT_HISTORY_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    rounds: VecDeque<RoundRecord>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl History {
    /// Create an empty history. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            rounds: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a completed round, evicting the oldest one when full.
    pub fn push(&mut self, round: RoundRecord) {
        if self.rounds.len() == self.capacity {
            self.rounds.pop_front();
        }
        self.rounds.push_back(round);
    }

    /// Most recently completed round.
    pub fn first(&self) -> Option<&RoundRecord> {
        self.rounds.back()
    }

    /// Oldest retained round.
    pub fn last(&self) -> Option<&RoundRecord> {
        self.rounds.front()
    }

    /// All retained rounds, oldest first.
    pub fn to_vec(&self) -> Vec<RoundRecord> {
        self.rounds.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
