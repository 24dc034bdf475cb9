//! State persistence layer
//!
//! Responsible for storing and loading profiles, conversations and
//! violation counters. In-memory for development; Postgres in `postgres`.

use crate::error::OrchestrationError;
use crate::guardrails::ViolationTracker;
use crate::memory::Turn;
use crate::models::{ConversationState, Phase, ViolationCategory, ViolationCounts};
use crate::persona::Profile;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod postgres;
pub use postgres::PgStateStore;

/// Trait for state persistence
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn load_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;
    async fn save_profile(&self, profile: &Profile) -> Result<()>;

    /// The user's active conversation, with its full stored transcript
    async fn load_active_conversation(&self, user_id: Uuid) -> Result<Option<ConversationState>>;
    /// Persist a freshly created conversation and make it the active one
    async fn create_conversation(&self, state: &ConversationState) -> Result<()>;

    async fn append_turn(&self, conversation_id: Uuid, turn: &Turn) -> Result<()>;
    async fn save_phase(&self, conversation_id: Uuid, phase: Phase) -> Result<()>;
    async fn save_summary(&self, conversation_id: Uuid, summary: &str) -> Result<()>;
    /// Drop all but the last `keep_last` stored turns
    async fn truncate_transcript(&self, conversation_id: Uuid, keep_last: usize) -> Result<()>;

    async fn violation_counts(&self, user_id: Uuid, conversation_id: Uuid) -> Result<ViolationCounts>;
    /// Record one violation and return the new count
    async fn increment_violation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        category: ViolationCategory,
    ) -> Result<u32>;
}

/// In-memory state store for development
pub struct InMemoryStateStore {
    profiles: Arc<RwLock<HashMap<Uuid, Profile>>>,
    conversations: Arc<RwLock<HashMap<Uuid, ConversationState>>>,
    active_by_user: Arc<RwLock<HashMap<Uuid, Uuid>>>, // user_id → conversation_id
    violations: Arc<RwLock<ViolationTracker>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            profiles: Arc::new(RwLock::new(HashMap::new())),
            conversations: Arc::new(RwLock::new(HashMap::new())),
            active_by_user: Arc::new(RwLock::new(HashMap::new())),
            violations: Arc::new(RwLock::new(ViolationTracker::new())),
        }
    }

    async fn with_conversation<F>(&self, conversation_id: Uuid, apply: F) -> Result<()>
    where
        F: FnOnce(&mut ConversationState) + Send,
    {
        let mut conversations = self.conversations.write().await;
        let state = conversations.get_mut(&conversation_id).ok_or_else(|| {
            OrchestrationError::StateError(format!("Unknown conversation {}", conversation_id))
        })?;
        apply(state);
        Ok(())
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn load_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&user_id).cloned())
    }

    async fn save_profile(&self, profile: &Profile) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn load_active_conversation(&self, user_id: Uuid) -> Result<Option<ConversationState>> {
        let conversation_id = {
            let active = self.active_by_user.read().await;
            active.get(&user_id).copied()
        };

        let Some(conversation_id) = conversation_id else {
            return Ok(None);
        };

        let conversations = self.conversations.read().await;
        Ok(conversations.get(&conversation_id).cloned())
    }

    async fn create_conversation(&self, state: &ConversationState) -> Result<()> {
        {
            let mut conversations = self.conversations.write().await;
            conversations.insert(state.conversation_id, state.clone());
        }

        let mut active = self.active_by_user.write().await;
        active.insert(state.user_id, state.conversation_id);
        Ok(())
    }

    async fn append_turn(&self, conversation_id: Uuid, turn: &Turn) -> Result<()> {
        let turn = turn.clone();
        self.with_conversation(conversation_id, move |state| state.transcript.push(turn))
            .await
    }

    async fn save_phase(&self, conversation_id: Uuid, phase: Phase) -> Result<()> {
        self.with_conversation(conversation_id, move |state| state.phase = phase)
            .await
    }

    async fn save_summary(&self, conversation_id: Uuid, summary: &str) -> Result<()> {
        let summary = summary.to_string();
        self.with_conversation(conversation_id, move |state| state.summary = Some(summary))
            .await
    }

    async fn truncate_transcript(&self, conversation_id: Uuid, keep_last: usize) -> Result<()> {
        self.with_conversation(conversation_id, move |state| {
            state.transcript.truncate_to_recent(keep_last)
        })
        .await
    }

    async fn violation_counts(&self, user_id: Uuid, conversation_id: Uuid) -> Result<ViolationCounts> {
        let violations = self.violations.read().await;
        Ok(violations.counts_for(user_id, conversation_id))
    }

    async fn increment_violation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        category: ViolationCategory,
    ) -> Result<u32> {
        let mut violations = self.violations.write().await;
        Ok(violations.record(user_id, conversation_id, category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let store = InMemoryStateStore::new();
        let user_id = Uuid::new_v4();

        assert!(store.load_active_conversation(user_id).await.unwrap().is_none());

        let state = ConversationState::new(user_id);
        store.create_conversation(&state).await.unwrap();

        for i in 0..5 {
            store
                .append_turn(state.conversation_id, &Turn::user(format!("m{}", i)))
                .await
                .unwrap();
        }
        store.save_phase(state.conversation_id, Phase::Diet).await.unwrap();
        store.save_summary(state.conversation_id, "notes").await.unwrap();
        store.truncate_transcript(state.conversation_id, 2).await.unwrap();

        let loaded = store.load_active_conversation(user_id).await.unwrap().unwrap();
        assert_eq!(loaded.phase, Phase::Diet);
        assert_eq!(loaded.summary.as_deref(), Some("notes"));
        assert_eq!(loaded.transcript.len(), 2);
        assert_eq!(loaded.transcript.turns()[0].content, "m3");
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_error() {
        let store = InMemoryStateStore::new();
        let result = store.append_turn(Uuid::new_v4(), &Turn::user("hi")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_profile_roundtrip() {
        let store = InMemoryStateStore::new();
        let mut profile = Profile::new(Uuid::new_v4());
        profile.age = Some(30);

        store.save_profile(&profile).await.unwrap();
        assert_eq!(store.load_profile(profile.user_id).await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn test_violation_counting() {
        let store = InMemoryStateStore::new();
        let (user, conv) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store
            .increment_violation(user, conv, ViolationCategory::Medical)
            .await
            .unwrap();
        let second = store
            .increment_violation(user, conv, ViolationCategory::Medical)
            .await
            .unwrap();

        assert_eq!((first, second), (1, 2));
        let counts = store.violation_counts(user, conv).await.unwrap();
        assert_eq!(counts.get(&ViolationCategory::Medical), Some(&2));
    }
}
