//! Environment configuration

use crate::agent::OrchestratorConfig;
use crate::error::OrchestrationError;
use crate::memory::CompactionConfig;
use crate::Result;
use std::str::FromStr;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Empty when unset; the Gemini client refuses to call without it
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub port: u16,
    /// `None` selects the in-memory store
    pub database_url: Option<String>,
    pub compaction: CompactionConfig,
    pub orchestrator: OrchestratorConfig,
}

impl AppConfig {
    /// Read configuration from the process environment (after `.env`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let compaction_defaults = CompactionConfig::default();
        let compaction = CompactionConfig {
            threshold: parse_or(&var, "COMPACTION_THRESHOLD", compaction_defaults.threshold)?,
            keep_recent: parse_or(&var, "COMPACTION_KEEP_RECENT", compaction_defaults.keep_recent)?,
        };

        if compaction.keep_recent > compaction.threshold {
            return Err(OrchestrationError::ConfigError(format!(
                "COMPACTION_KEEP_RECENT ({}) must not exceed COMPACTION_THRESHOLD ({})",
                compaction.keep_recent, compaction.threshold
            )));
        }

        let port = match var("PORT").or_else(|| var("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            gemini_api_key: var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            port,
            database_url: var("DATABASE_URL").or_else(|| var("POSTGRES_URL")),
            compaction,
            orchestrator: OrchestratorConfig {
                context_turns: parse_or(
                    &var,
                    "CONTEXT_TURNS",
                    OrchestratorConfig::default().context_turns,
                )?,
            },
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        OrchestrationError::ConfigError(format!("Invalid value for {}: '{}'", key, raw))
    })
}
