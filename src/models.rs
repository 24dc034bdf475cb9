//! Core data models for the turn orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::memory::Transcript;
use crate::persona::{FieldName, Profile};

//
// ================= Intent =================
//

/// Closed label set returned by the intent classifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Diet,
    Fitness,
    Skin,
    Lifestyle,
    Medical,
    Sexual,
    OffTopic,
    Harmful,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::Diet,
        Intent::Fitness,
        Intent::Skin,
        Intent::Lifestyle,
        Intent::Medical,
        Intent::Sexual,
        Intent::OffTopic,
        Intent::Harmful,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Diet => "diet",
            Intent::Fitness => "fitness",
            Intent::Skin => "skin",
            Intent::Lifestyle => "lifestyle",
            Intent::Medical => "medical",
            Intent::Sexual => "sexual",
            Intent::OffTopic => "off_topic",
            Intent::Harmful => "harmful",
        }
    }

    /// Exact match against the closed label set
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|intent| intent.as_str() == label)
    }

    /// Category recorded by the violation tracker when this intent is blocked
    pub fn violation_category(&self) -> Option<ViolationCategory> {
        match self {
            Intent::Medical => Some(ViolationCategory::Medical),
            Intent::Sexual => Some(ViolationCategory::Sexual),
            Intent::Harmful => Some(ViolationCategory::Harmful),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Topic & Phase =================
//

/// Main conversation topics that can carry persona requirements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Diet,
    Fitness,
    Skin,
    Hair,
    Lifestyle,
}

impl Topic {
    /// Map a classified intent to a main topic.
    ///
    /// `lifestyle` becomes `hair` when the message is about hair.
    pub fn from_intent(intent: Intent, hair_related: bool) -> Option<Self> {
        match intent {
            Intent::Diet => Some(Topic::Diet),
            Intent::Fitness => Some(Topic::Fitness),
            Intent::Skin => Some(Topic::Skin),
            Intent::Lifestyle if hair_related => Some(Topic::Hair),
            Intent::Lifestyle => Some(Topic::Lifestyle),
            _ => None,
        }
    }
}

/// Sticky per-conversation phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Persona,
    Diet,
    Fitness,
    Hair,
    Skin,
    Lifestyle,
    Complete,
}

impl Phase {
    /// Topic in progress, if the phase is a main topic
    pub fn topic(&self) -> Option<Topic> {
        match self {
            Phase::Diet => Some(Topic::Diet),
            Phase::Fitness => Some(Topic::Fitness),
            Phase::Hair => Some(Topic::Hair),
            Phase::Skin => Some(Topic::Skin),
            Phase::Lifestyle => Some(Topic::Lifestyle),
            Phase::Persona | Phase::Complete => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Persona => "persona",
            Phase::Diet => "diet",
            Phase::Fitness => "fitness",
            Phase::Hair => "hair",
            Phase::Skin => "skin",
            Phase::Lifestyle => "lifestyle",
            Phase::Complete => "complete",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "persona" => Some(Phase::Persona),
            "diet" => Some(Phase::Diet),
            "fitness" => Some(Phase::Fitness),
            "hair" => Some(Phase::Hair),
            "skin" => Some(Phase::Skin),
            "lifestyle" => Some(Phase::Lifestyle),
            "complete" => Some(Phase::Complete),
            _ => None,
        }
    }
}

impl From<Topic> for Phase {
    fn from(topic: Topic) -> Self {
        match topic {
            Topic::Diet => Phase::Diet,
            Topic::Fitness => Phase::Fitness,
            Topic::Skin => Phase::Skin,
            Topic::Hair => Phase::Hair,
            Topic::Lifestyle => Phase::Lifestyle,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Violations =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ViolationCategory {
    Medical,
    Sexual,
    Harmful,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCategory::Medical => "medical",
            ViolationCategory::Sexual => "sexual",
            ViolationCategory::Harmful => "harmful",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "medical" => Some(ViolationCategory::Medical),
            "sexual" => Some(ViolationCategory::Sexual),
            "harmful" => Some(ViolationCategory::Harmful),
            _ => None,
        }
    }
}

/// Counts for one (user, conversation), keyed by category
pub type ViolationCounts = HashMap<ViolationCategory, u32>;

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub phase: Phase,
    pub summary: Option<String>,
    pub transcript: Transcript,
    pub created_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            conversation_id: Uuid::new_v4(),
            user_id,
            phase: Phase::Persona,
            summary: None,
            transcript: Transcript::new(),
            created_at: Utc::now(),
        }
    }
}

//
// ================= Gate Decision =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// `repeat` is set once the user already hit the medical redirect
    Medical { repeat: bool },
    Sexual,
    Harmful,
}

/// Outcome of the gate for one turn. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Block {
        reason: BlockReason,
        message: String,
    },
    AskField {
        field: FieldName,
        question: String,
    },
    Proceed {
        profile: Profile,
        missing_fields: Vec<FieldName>,
    },
}

impl GateDecision {
    pub fn label(&self) -> &'static str {
        match self {
            GateDecision::Block { .. } => "block",
            GateDecision::AskField { .. } => "ask_field",
            GateDecision::Proceed { .. } => "proceed",
        }
    }
}

//
// ================= Turn I/O =================
//

/// Inbound message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnDisposition {
    Blocked,
    AskedField,
    Answered,
    GenerationFailed,
}

/// Outbound reply plus how the turn ended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub reply: String,
    pub disposition: TurnDisposition,
    pub conversation_id: Uuid,
}
