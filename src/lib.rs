//! Health Turn Orchestrator
//!
//! Turn-processing backend for a health & lifestyle assistant that:
//! - Blocks medical, sexual and harmful requests before anything else runs
//! - Asks for exactly one missing profile field when a topic needs it
//! - Tracks the topic in progress so short replies stay attributed
//! - Compacts long conversations into a rolling summary
//!
//! PER TURN:
//! RECORD → EXTRACT → CLASSIFY → GATE → COMPACT? → GENERATE → RECORD

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod guardrails;
pub mod memory;
pub mod models;
pub mod oracle;
pub mod persona;
pub mod prompts;
pub mod state;

pub use error::Result;

// Re-export common types
pub use agent::TurnOrchestrator;
pub use classifier::IntentClassifier;
pub use guardrails::GateEngine;
pub use models::*;
