//! Intent Classifier
//!
//! Maps free text onto the closed label set:
//! diet, fitness, skin, lifestyle, medical, sexual, off_topic, harmful.
//!
//! Anything the oracle returns outside that set, including failures and
//! empty output, becomes `off_topic`. The fallback never lands on a
//! blocking label.

use crate::models::{Intent, Topic};
use crate::oracle::{complete_text, CompletionOracle, OracleMessage};
use crate::prompts;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefixes models like to put in front of the label
const LABEL_MARKERS: &[&str] = &["intent:", "label:", "category:", "answer:"];

/// Whole words, or word sequences for the multi-word entries
const HAIR_KEYWORDS: &[&str] = &[
    "hair", "hairs", "hairfall", "haircare", "hairline", "hair fall", "hair loss", "dandruff",
    "scalp", "baal", "bald", "balding", "split ends", "frizz", "frizzy",
];

/// Oracle-backed intent classifier
pub struct IntentClassifier {
    oracle: Arc<dyn CompletionOracle>,
}

impl IntentClassifier {
    pub fn new(oracle: Arc<dyn CompletionOracle>) -> Self {
        Self { oracle }
    }

    /// Classify one message. Single oracle call, no retries.
    pub async fn classify(&self, text: &str) -> Intent {
        if text.trim().is_empty() {
            debug!("Empty message, classifying as off_topic without oracle call");
            return Intent::OffTopic;
        }

        let messages = [
            OracleMessage::system(prompts::CLASSIFIER_SYSTEM),
            OracleMessage::user(prompts::intent_prompt(text)),
        ];

        match complete_text(self.oracle.as_ref(), &messages).await {
            Ok(raw) => {
                let intent = normalize_label(&raw);
                debug!(raw = %raw.trim(), intent = %intent, "Intent classified");
                intent
            }
            Err(e) => {
                warn!("Intent classification failed, defaulting to off_topic: {}", e);
                Intent::OffTopic
            }
        }
    }
}

/// Normalize raw oracle output into a label, failing closed to `off_topic`
pub fn normalize_label(raw: &str) -> Intent {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '_' || c == ':' {
                Some(c)
            } else if c == '-' || c.is_whitespace() {
                Some(' ')
            } else {
                None
            }
        })
        .collect();

    let mut label = cleaned.trim();
    loop {
        let before = label;
        for marker in LABEL_MARKERS {
            if let Some(rest) = label.strip_prefix(marker) {
                label = rest.trim();
            }
        }
        if before == label {
            break;
        }
    }

    let folded = label
        .replace(':', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    Intent::from_label(&folded).unwrap_or(Intent::OffTopic)
}

/// Hair keyword detection on word boundaries, so "chair" is not hair
pub fn is_hair_related(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    HAIR_KEYWORDS.iter().any(|kw| {
        let phrase: Vec<&str> = kw.split(' ').collect();
        words.windows(phrase.len()).any(|window| window == phrase.as_slice())
    })
}

/// Main topic carried by this turn, if any
pub fn resolve_topic(intent: Intent, text: &str) -> Option<Topic> {
    Topic::from_intent(intent, intent == Intent::Lifestyle && is_hair_related(text))
}
