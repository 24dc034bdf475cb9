//! Memory compaction
//!
//! Once the stored transcript grows past the threshold, everything except the
//! most recent turns is folded into the rolling summary. Recency is the only
//! signal. The new summary replaces the old one; the old summary is fed into
//! the summarization prompt so nothing it held is dropped silently.

use crate::memory::summarizer::ContextSummarizer;
use crate::models::ConversationState;
use tracing::{info, warn};

/// Configuration for transcript compaction
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// Compact when the transcript holds more than this many turns
    pub threshold: usize,
    /// Turns kept verbatim after compaction
    pub keep_recent: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            threshold: 40,
            keep_recent: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    NotNeeded,
    Compacted { archived: usize, summary: String },
    /// Summarization failed; transcript and summary untouched
    Skipped,
}

pub struct MemoryCompactor {
    config: CompactionConfig,
    summarizer: ContextSummarizer,
}

impl MemoryCompactor {
    pub fn new(summarizer: ContextSummarizer) -> Self {
        Self::with_config(summarizer, CompactionConfig::default())
    }

    pub fn with_config(summarizer: ContextSummarizer, config: CompactionConfig) -> Self {
        Self { config, summarizer }
    }

    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    pub fn should_compact(&self, transcript_len: usize) -> bool {
        transcript_len > self.config.threshold
    }

    /// Summarize and truncate `state` in place when over the threshold.
    ///
    /// `state` is only modified on success.
    pub async fn compact(&self, state: &mut ConversationState) -> CompactionOutcome {
        if !self.should_compact(state.transcript.len()) {
            return CompactionOutcome::NotNeeded;
        }

        let (old, _recent) = state.transcript.split_recent(self.config.keep_recent);
        let archived = old.len();

        info!(
            conversation_id = %state.conversation_id,
            turns = state.transcript.len(),
            archived,
            "Transcript over threshold, compacting"
        );

        match self.summarizer.summarize(state.summary.as_deref(), old).await {
            Ok(summary) => {
                state.summary = Some(summary.clone());
                state.transcript.truncate_to_recent(self.config.keep_recent);
                CompactionOutcome::Compacted { archived, summary }
            }
            Err(e) => {
                warn!("Failed to summarize transcript, keeping it as is: {}", e);
                CompactionOutcome::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::Turn;
    use crate::oracle::{last_user_content, MockOracle};
    use std::sync::Arc;
    use uuid::Uuid;

    fn state_with_turns(count: usize) -> ConversationState {
        let mut state = ConversationState::new(Uuid::new_v4());
        for i in 0..count {
            state.transcript.push(Turn::user(format!("turn {}", i)));
        }
        state
    }

    fn compactor(response: Option<&'static str>) -> MemoryCompactor {
        let oracle = Arc::new(MockOracle::new(move |_, messages| {
            let prompt = last_user_content(messages).unwrap_or_default();
            assert!(prompt.contains("turn 10"));
            assert!(!prompt.contains("turn 11"));
            response.map(str::to_string)
        }));
        MemoryCompactor::new(ContextSummarizer::new(oracle))
    }

    #[test]
    fn test_threshold() {
        let compactor = compactor(None);
        assert!(!compactor.should_compact(40));
        assert!(compactor.should_compact(41));
    }

    #[tokio::test]
    async fn test_compacts_old_turns() {
        let mut state = state_with_turns(41);
        let outcome = compactor(Some("notes")).compact(&mut state).await;

        assert_eq!(
            outcome,
            CompactionOutcome::Compacted {
                archived: 11,
                summary: "notes".to_string()
            }
        );
        assert_eq!(state.summary.as_deref(), Some("notes"));
        assert_eq!(state.transcript.len(), 30);
        assert_eq!(state.transcript.turns()[0].content, "turn 11");
    }

    #[tokio::test]
    async fn test_failure_leaves_state_untouched() {
        let mut state = state_with_turns(41);
        state.summary = Some("earlier notes".to_string());
        let before = state.transcript.clone();

        let outcome = compactor(None).compact(&mut state).await;

        assert_eq!(outcome, CompactionOutcome::Skipped);
        assert_eq!(state.transcript, before);
        assert_eq!(state.summary.as_deref(), Some("earlier notes"));
    }

    #[tokio::test]
    async fn test_below_threshold_is_noop() {
        let mut state = state_with_turns(40);
        let outcome = compactor(Some("notes")).compact(&mut state).await;
        assert_eq!(outcome, CompactionOutcome::NotNeeded);
        assert_eq!(state.transcript.len(), 40);
    }
}
