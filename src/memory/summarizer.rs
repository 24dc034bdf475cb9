//! Context Summarization
//!
//! Uses the oracle to fold old turns (and any earlier summary) into compact
//! memory notes when the transcript gets too long

use crate::error::OrchestrationError;
use crate::memory::store::{Transcript, Turn};
use crate::oracle::{complete_text, CompletionOracle, OracleMessage};
use crate::prompts;
use std::sync::Arc;
use tracing::info;

/// Summarizes conversation turns using the oracle
pub struct ContextSummarizer {
    oracle: Arc<dyn CompletionOracle>,
}

impl ContextSummarizer {
    pub fn new(oracle: Arc<dyn CompletionOracle>) -> Self {
        Self { oracle }
    }

    /// Summary covering `prior` plus `turns`
    pub async fn summarize(&self, prior: Option<&str>, turns: &[Turn]) -> crate::Result<String> {
        if turns.is_empty() {
            return Err(OrchestrationError::OracleError(
                "Cannot summarize empty turn list".to_string(),
            ));
        }

        let conversation_text = Transcript::format_lines(turns);

        let messages = [
            OracleMessage::system(prompts::SUMMARIZER_SYSTEM),
            OracleMessage::user(prompts::summary_prompt(prior, &conversation_text)),
        ];

        info!("Calling oracle to summarize {} turns", turns.len());

        let summary = complete_text(self.oracle.as_ref(), &messages).await?;
        Ok(summary.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{last_user_content, MockOracle};

    #[tokio::test]
    async fn test_summary_includes_prior_and_turns() {
        let oracle = Arc::new(MockOracle::new(|_, messages| {
            let prompt = last_user_content(messages)?;
            assert!(prompt.contains("User is vegetarian."));
            assert!(prompt.contains("user: I am 22"));
            Some("  User is 22 and vegetarian.  ".to_string())
        }));
        let summarizer = ContextSummarizer::new(oracle);

        let summary = summarizer
            .summarize(Some("User is vegetarian."), &[Turn::user("I am 22")])
            .await
            .unwrap();
        assert_eq!(summary, "User is 22 and vegetarian.");
    }

    #[tokio::test]
    async fn test_empty_turns_rejected() {
        let summarizer = ContextSummarizer::new(Arc::new(MockOracle::new(|_, _| {
            Some("notes".to_string())
        })));
        assert!(summarizer.summarize(None, &[]).await.is_err());
    }
}
