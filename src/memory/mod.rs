//! Conversation Memory
//!
//! Transcript storage, oracle-backed summarization and size-bounded
//! compaction of long conversations

pub mod compactor;
pub mod store;
pub mod summarizer;

pub use compactor::{CompactionConfig, CompactionOutcome, MemoryCompactor};
pub use store::{Transcript, Turn, TurnRole};
pub use summarizer::ContextSummarizer;
