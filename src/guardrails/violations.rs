//! Violation counters keyed by (user, conversation, category).
//! Counts only ever go up.

use crate::models::{ViolationCategory, ViolationCounts};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
pub struct ViolationTracker {
    counts: HashMap<(Uuid, Uuid, ViolationCategory), u32>,
}

impl ViolationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence and return the new count
    pub fn record(&mut self, user_id: Uuid, conversation_id: Uuid, category: ViolationCategory) -> u32 {
        let count = self
            .counts
            .entry((user_id, conversation_id, category))
            .or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn counts_for(&self, user_id: Uuid, conversation_id: Uuid) -> ViolationCounts {
        self.counts
            .iter()
            .filter(|((user, conv, _), _)| *user == user_id && *conv == conversation_id)
            .map(|((_, _, category), count)| (*category, *count))
            .collect()
    }
}
