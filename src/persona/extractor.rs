//! Profile extraction
//!
//! Uses the oracle ONLY to pull structured persona signals out of a message.
//! Never controls conversation flow. Any failure yields an empty update.

use crate::oracle::{complete_text, CompletionOracle, OracleMessage};
use crate::persona::profile::{
    ActivityLevel, AuxField, DietType, FitnessGoal, Gender, PartialProfile,
};
use crate::prompts;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ProfileExtractor {
    oracle: Arc<dyn CompletionOracle>,
}

impl ProfileExtractor {
    pub fn new(oracle: Arc<dyn CompletionOracle>) -> Self {
        Self { oracle }
    }

    /// Candidate profile update for one message
    pub async fn extract(&self, text: &str) -> PartialProfile {
        if text.trim().is_empty() {
            return PartialProfile::default();
        }

        let messages = [
            OracleMessage::system(prompts::EXTRACTOR_SYSTEM),
            OracleMessage::user(prompts::extraction_prompt(text)),
        ];

        match complete_text(self.oracle.as_ref(), &messages).await {
            Ok(raw) => parse_extraction(&raw),
            Err(e) => {
                warn!("Profile extraction failed, using empty update: {}", e);
                PartialProfile::default()
            }
        }
    }
}

/// Strip an optional ```json fence around the payload. The language tag
/// is matched case-insensitively.
fn strip_fence(raw: &str) -> &str {
    let body = raw.trim();
    let body = match body.strip_prefix("```") {
        Some(rest) => match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        },
        None => body,
    };
    body.trim_end_matches("```").trim()
}

/// Folds `height_cm`, `heightCm` and `height-cm` onto one key
fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Integral numbers only; digit strings are accepted
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_label(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse oracle output into a candidate update.
///
/// Malformed output or a non-object payload gives an empty update; unknown
/// keys and values of the wrong shape are dropped.
pub fn parse_extraction(raw: &str) -> PartialProfile {
    let mut partial = PartialProfile::default();

    let map = match serde_json::from_str::<Value>(strip_fence(raw)) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            debug!("Extraction output is not a JSON object");
            return partial;
        }
        Err(e) => {
            debug!("Extraction output is not valid JSON: {}", e);
            return partial;
        }
    };

    for (key, value) in &map {
        if value.is_null() {
            continue;
        }

        match canonical_key(key).as_str() {
            "age" => partial.age = as_integer(value),
            "heightcm" | "height" => partial.height_cm = as_integer(value),
            "weightkg" | "weight" => partial.weight_kg = as_integer(value),
            "gender" => partial.gender = as_label(value).and_then(Gender::parse),
            "goal" => partial.goal = as_label(value).and_then(FitnessGoal::parse),
            "diettype" => partial.diet_type = as_label(value).and_then(DietType::parse),
            "activitylevel" => {
                partial.activity_level = as_label(value).and_then(ActivityLevel::parse)
            }
            other => {
                let Some(field) = AuxField::ALL
                    .into_iter()
                    .find(|f| canonical_key(f.key()) == other)
                else {
                    debug!(key = %key, "Ignoring unknown extraction key");
                    continue;
                };

                let raw_value = match (field, value) {
                    (AuxField::Dandruff, Value::Bool(true)) => Some("yes".to_string()),
                    (AuxField::Dandruff, Value::Bool(false)) => Some("no".to_string()),
                    (_, v) => as_label(v).map(str::to_string),
                };

                if let Some(raw_value) = raw_value {
                    partial.aux.insert(field, raw_value);
                }
            }
        }
    }

    partial
}
