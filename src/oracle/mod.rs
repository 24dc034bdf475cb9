//! Text-completion oracle
//!
//! Every language step (classification, extraction, summarization, reply
//! generation) goes through [`CompletionOracle`]. Callers treat it as a
//! fallible black box.

use crate::error::OrchestrationError;
use crate::prompts;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

pub mod gemini;
pub use gemini::GeminiClient;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OracleRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OracleMessage {
    pub role: OracleRole,
    pub content: String,
}

impl OracleMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: OracleRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: OracleRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: OracleRole::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for text completion (LLM controlled)
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    async fn complete(&self, messages: &[OracleMessage]) -> Result<String>;
}

/// Call the oracle and treat blank output as a failure
pub async fn complete_text(
    oracle: &dyn CompletionOracle,
    messages: &[OracleMessage],
) -> Result<String> {
    let text = oracle.complete(messages).await?;
    if text.trim().is_empty() {
        return Err(OrchestrationError::OracleError(
            "Oracle returned empty text".to_string(),
        ));
    }
    Ok(text)
}

/// Which instruction framing a request carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleTask {
    Classification,
    Extraction,
    Summarization,
    Generation,
}

impl OracleTask {
    /// Identify the task from the leading system message
    pub fn detect(messages: &[OracleMessage]) -> Self {
        let leading = messages
            .first()
            .filter(|m| m.role == OracleRole::System)
            .map(|m| m.content.as_str());

        match leading {
            Some(prompts::CLASSIFIER_SYSTEM) => OracleTask::Classification,
            Some(prompts::EXTRACTOR_SYSTEM) => OracleTask::Extraction,
            Some(prompts::SUMMARIZER_SYSTEM) => OracleTask::Summarization,
            _ => OracleTask::Generation,
        }
    }
}

type Responder = dyn Fn(OracleTask, &[OracleMessage]) -> Option<String> + Send + Sync;

/// Scripted oracle for development & testing.
/// Keeps the pipeline runnable without a live model.
pub struct MockOracle {
    responder: Box<Responder>,
    calls: Mutex<HashMap<OracleTask, usize>>,
}

impl MockOracle {
    /// `responder` returning `None` simulates an oracle failure
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(OracleTask, &[OracleMessage]) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Number of calls seen for a task
    pub fn calls(&self, task: OracleTask) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(&task).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl CompletionOracle for MockOracle {
    async fn complete(&self, messages: &[OracleMessage]) -> Result<String> {
        let task = OracleTask::detect(messages);

        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(task).or_insert(0) += 1;
        }

        (self.responder)(task, messages).ok_or_else(|| {
            OrchestrationError::OracleUnavailable(format!("No scripted response for {:?}", task))
        })
    }
}

/// Content of the last user message in a request
pub fn last_user_content(messages: &[OracleMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == OracleRole::User)
        .map(|m| m.content.as_str())
}
