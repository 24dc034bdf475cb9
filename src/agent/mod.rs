//! Turn orchestrator - one pipeline run per inbound message
//!
//! RECORD → EXTRACT → CLASSIFY → GATE → COMPACT? → GENERATE → RECORD
//!
//! Turns for the same user are serialized; different users run in parallel.

use crate::classifier::{resolve_topic, IntentClassifier};
use crate::error::OrchestrationError;
use crate::guardrails::{GateEngine, GateInput};
use crate::memory::{CompactionOutcome, MemoryCompactor, Turn, TurnRole};
use crate::models::{ConversationState, GateDecision, Phase, TurnDisposition, TurnReply, TurnRequest};
use crate::oracle::{complete_text, CompletionOracle, OracleMessage};
use crate::persona::{merge_into, Profile, ProfileExtractor};
use crate::prompts;
use crate::state::StateStore;
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shown when final generation fails. Never stored in the transcript.
pub const GENERATION_FALLBACK: &str =
    "Sorry, I couldn't put a reply together just now. Please try again in a moment.";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Transcript turns passed verbatim into generation
    pub context_turns: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { context_turns: 12 }
    }
}

/// Map a caller-supplied id onto a UUID. Non-UUID strings hash to a
/// deterministic v4-shaped UUID so the same caller always lands on the
/// same profile.
pub fn resolve_user_id(raw: &str) -> Result<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(OrchestrationError::InvalidRequest(
            "user_id must not be empty".to_string(),
        ));
    }

    Ok(Uuid::parse_str(raw).unwrap_or_else(|_| stable_uuid_from_string(raw)))
}

fn stable_uuid_from_string(input: &str) -> Uuid {
    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// One async mutex per user; a user has a single active conversation.
/// Entries live only while a turn holds or waits on them.
#[derive(Default)]
struct ConversationLocks {
    inner: std::sync::Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    async fn acquire(&self, user_id: Uuid) -> UserTurnGuard<'_> {
        let lock = {
            let mut locks = self.entries();
            locks.entry(user_id).or_default().clone()
        };

        UserTurnGuard {
            locks: self,
            user_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<Mutex<()>>>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Holds a user's turn lock and drops the map entry once nobody else
/// holds or waits on it
struct UserTurnGuard<'a> {
    locks: &'a ConversationLocks,
    user_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserTurnGuard<'_> {
    fn drop(&mut self) {
        // Map lock first, so no new waiter can clone the entry in between
        let owner = self.locks;
        let mut locks = owner.entries();
        drop(self.guard.take());

        let idle = locks
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.user_id);
        }
    }
}

pub struct TurnOrchestrator {
    store: Arc<dyn StateStore>,
    oracle: Arc<dyn CompletionOracle>,
    classifier: IntentClassifier,
    extractor: ProfileExtractor,
    compactor: MemoryCompactor,
    config: OrchestratorConfig,
    locks: ConversationLocks,
}

impl TurnOrchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        oracle: Arc<dyn CompletionOracle>,
        compactor: MemoryCompactor,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(oracle.clone()),
            extractor: ProfileExtractor::new(oracle.clone()),
            store,
            oracle,
            compactor,
            config,
            locks: ConversationLocks::default(),
        }
    }

    /// Process one inbound message to completion.
    ///
    /// Only persistence failures and an empty `user_id` surface as `Err`.
    /// A failed generation is reported through
    /// [`TurnDisposition::GenerationFailed`] with a fallback reply.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnReply> {
        let user_id = resolve_user_id(&request.user_id)?;
        let _guard = self.locks.acquire(user_id).await;

        self.process_turn(user_id, &request.message).await
    }

    async fn process_turn(&self, user_id: Uuid, message: &str) -> Result<TurnReply> {
        let (mut profile, profile_is_new) = match self.store.load_profile(user_id).await? {
            Some(profile) => (profile, false),
            None => (Profile::new(user_id), true),
        };
        let mut conversation = self.active_conversation(user_id).await?;
        let conversation_id = conversation.conversation_id;

        info!(
            user_id = %user_id,
            conversation_id = %conversation_id,
            phase = %conversation.phase,
            "Orchestrator: turn received"
        );

        // === RECORD ===
        let user_turn = Turn::user(message);
        self.store.append_turn(conversation_id, &user_turn).await?;
        conversation.transcript.push(user_turn);

        // === EXTRACT ===
        let update = self.extractor.extract(message).await;
        let changed = merge_into(&mut profile, &update);
        if changed || profile_is_new {
            self.store.save_profile(&profile).await?;
        }
        debug!(changed, known = profile.known_fields().len(), "Profile merged");

        // === CLASSIFY ===
        let intent = self.classifier.classify(message).await;
        let topic = resolve_topic(intent, message);

        // === GATE ===
        let violations = self.store.violation_counts(user_id, conversation_id).await?;
        let outcome = GateEngine::decide(&GateInput {
            intent,
            topic,
            phase: conversation.phase,
            profile: &profile,
            violations: &violations,
        });

        info!(
            conversation_id = %conversation_id,
            intent = %intent,
            phase = %outcome.phase,
            decision = outcome.decision.label(),
            "Gate decided"
        );

        let snapshot = match outcome.decision {
            GateDecision::Block { reason, message: reply } => {
                if let Some(category) = outcome.violation {
                    let count = self
                        .store
                        .increment_violation(user_id, conversation_id, category)
                        .await?;
                    warn!(
                        user_id = %user_id,
                        conversation_id = %conversation_id,
                        category = category.as_str(),
                        count,
                        ?reason,
                        "Violation recorded"
                    );
                }

                return Ok(TurnReply {
                    reply,
                    disposition: TurnDisposition::Blocked,
                    conversation_id,
                });
            }
            GateDecision::AskField { field, question } => {
                self.persist_phase(&mut conversation, outcome.phase).await?;
                self.store
                    .append_turn(conversation_id, &Turn::assistant(question.as_str()))
                    .await?;

                info!(field = %field, "Asking for profile field");
                return Ok(TurnReply {
                    reply: question,
                    disposition: TurnDisposition::AskedField,
                    conversation_id,
                });
            }
            GateDecision::Proceed { profile, .. } => profile,
        };

        self.persist_phase(&mut conversation, outcome.phase).await?;

        // === COMPACT ===
        if let CompactionOutcome::Compacted { archived, summary } =
            self.compactor.compact(&mut conversation).await
        {
            self.store.save_summary(conversation_id, &summary).await?;
            self.store
                .truncate_transcript(conversation_id, self.compactor.config().keep_recent)
                .await?;
            info!(conversation_id = %conversation_id, archived, "Transcript compacted");
        }

        // === GENERATE ===
        let messages = self.generation_messages(&snapshot, &conversation);

        match self.generate(&messages).await {
            Ok(reply) => {
                self.store
                    .append_turn(conversation_id, &Turn::assistant(reply.as_str()))
                    .await?;

                Ok(TurnReply {
                    reply,
                    disposition: TurnDisposition::Answered,
                    conversation_id,
                })
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, "{}", e);
                Ok(TurnReply {
                    reply: GENERATION_FALLBACK.to_string(),
                    disposition: TurnDisposition::GenerationFailed,
                    conversation_id,
                })
            }
        }
    }

    async fn generate(&self, messages: &[OracleMessage]) -> Result<String> {
        complete_text(self.oracle.as_ref(), messages)
            .await
            .map(|reply| reply.trim().to_string())
            .map_err(|e| OrchestrationError::GenerationFailed(e.to_string()))
    }

    async fn active_conversation(&self, user_id: Uuid) -> Result<ConversationState> {
        if let Some(conversation) = self.store.load_active_conversation(user_id).await? {
            return Ok(conversation);
        }

        let conversation = ConversationState::new(user_id);
        self.store.create_conversation(&conversation).await?;
        info!(
            user_id = %user_id,
            conversation_id = %conversation.conversation_id,
            "Started new conversation"
        );
        Ok(conversation)
    }

    async fn persist_phase(
        &self,
        conversation: &mut ConversationState,
        phase: Phase,
    ) -> Result<()> {
        if conversation.phase == phase {
            return Ok(());
        }

        debug!(from = %conversation.phase, to = %phase, "Phase changed");
        self.store.save_phase(conversation.conversation_id, phase).await?;
        conversation.phase = phase;
        Ok(())
    }

    /// System framing, known profile, summary and the recent transcript
    fn generation_messages(
        &self,
        profile: &Profile,
        conversation: &ConversationState,
    ) -> Vec<OracleMessage> {
        let mut messages = vec![
            OracleMessage::system(prompts::system_guardrails_prompt()),
            OracleMessage::system(prompts::tone_prompt()),
        ];

        if let Some(persona) = prompts::persona_prompt(profile) {
            messages.push(OracleMessage::system(persona));
        }
        if let Some(summary) = conversation.summary.as_deref() {
            messages.push(OracleMessage::system(prompts::summary_context(summary)));
        }

        for turn in conversation.transcript.recent(self.config.context_turns) {
            messages.push(match turn.role {
                TurnRole::User => OracleMessage::user(turn.content.as_str()),
                TurnRole::Assistant => OracleMessage::assistant(turn.content.as_str()),
            });
        }

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CompactionConfig, ContextSummarizer};
    use crate::models::ViolationCategory;
    use crate::oracle::{last_user_content, MockOracle, OracleRole, OracleTask};
    use crate::persona::{FieldName, FieldRequirementPolicy};
    use crate::state::InMemoryStateStore;

    /// The user message sits quoted at the end of every task prompt
    fn quoted_message(prompt: &str) -> &str {
        prompt
            .rsplit("User message:\n\"")
            .next()
            .unwrap_or_default()
            .trim_end_matches('"')
    }

    fn scripted(generation: Option<&'static str>) -> Arc<MockOracle> {
        Arc::new(MockOracle::new(move |task, messages| {
            let prompt = last_user_content(messages).unwrap_or_default();
            match task {
                OracleTask::Classification => {
                    let message = quoted_message(prompt);
                    let label = if message.contains("diet plan") {
                        "diet"
                    } else if message.contains("fever") {
                        "Intent: medical"
                    } else {
                        "off_topic"
                    };
                    Some(label.to_string())
                }
                OracleTask::Extraction => {
                    let message = quoted_message(prompt);
                    let json = match message {
                        "22" => r#"{"age": 22}"#,
                        "I am 170 cm" => r#"{"height_cm": 170}"#,
                        _ => "{}",
                    };
                    Some(json.to_string())
                }
                OracleTask::Summarization => Some("User chatted a lot.".to_string()),
                OracleTask::Generation => generation.map(str::to_string),
            }
        }))
    }

    fn orchestrator(
        store: Arc<InMemoryStateStore>,
        oracle: Arc<MockOracle>,
    ) -> TurnOrchestrator {
        let compactor = MemoryCompactor::with_config(
            ContextSummarizer::new(oracle.clone()),
            CompactionConfig::default(),
        );
        TurnOrchestrator::new(store, oracle, compactor, OrchestratorConfig::default())
    }

    fn request(user_id: &str, message: &str) -> TurnRequest {
        TurnRequest {
            user_id: user_id.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_stable_user_ids() {
        let a = resolve_user_id("asha@example.com").unwrap();
        let b = resolve_user_id("  asha@example.com ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get_version_num(), 4);

        let id = Uuid::new_v4();
        assert_eq!(resolve_user_id(&id.to_string()).unwrap(), id);
        assert!(resolve_user_id("   ").is_err());
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_turns() {
        let locks = ConversationLocks::default();
        for _ in 0..1000 {
            let guard = locks.acquire(Uuid::new_v4()).await;
            drop(guard);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_lock_entry_kept_while_turn_waits() {
        let locks = Arc::new(ConversationLocks::default());
        let user_id = Uuid::new_v4();

        let first = locks.acquire(user_id).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(user_id).await;
            })
        };
        tokio::task::yield_now().await;

        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_empty_message_skips_classifier_and_generates() {
        let store = Arc::new(InMemoryStateStore::new());
        let oracle = scripted(Some("Hi there!"));
        let orchestrator = orchestrator(store, oracle.clone());

        let reply = orchestrator.handle_turn(request("u1", "   ")).await.unwrap();

        assert_eq!(reply.disposition, TurnDisposition::Answered);
        assert_eq!(reply.reply, "Hi there!");
        assert_eq!(oracle.calls(OracleTask::Classification), 0);
        assert_eq!(oracle.calls(OracleTask::Extraction), 0);
        assert_eq!(oracle.calls(OracleTask::Generation), 1);
        assert_eq!(orchestrator.locks.len(), 0);
    }

    #[test]
    fn test_generation_context_carries_known_profile_only() {
        let orchestrator = orchestrator(Arc::new(InMemoryStateStore::new()), scripted(None));
        let mut profile = Profile::new(Uuid::new_v4());
        profile.age = Some(22);

        let mut conversation = ConversationState::new(profile.user_id);
        conversation.summary = Some("Asked about breakfast.".to_string());
        conversation.transcript.push(Turn::user("what about lunch?"));

        let messages = orchestrator.generation_messages(&profile, &conversation);
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == OracleRole::System)
            .map(|m| m.content.as_str())
            .collect();

        assert_eq!(system.len(), 4);
        assert!(system[2].contains("- Age: 22"));
        assert!(system[3].contains("Asked about breakfast."));
        assert!(system.iter().all(|s| !s.contains("Height")));
        assert_eq!(messages.last().map(|m| m.content.as_str()), Some("what about lunch?"));
    }

    #[tokio::test]
    async fn test_diet_asks_age_then_height() {
        let store = Arc::new(InMemoryStateStore::new());
        let oracle = scripted(Some("Here is your plan."));
        let orchestrator = orchestrator(store.clone(), oracle.clone());

        let first = orchestrator
            .handle_turn(request("u1", "I want a diet plan"))
            .await
            .unwrap();
        assert_eq!(first.disposition, TurnDisposition::AskedField);
        assert_eq!(first.reply, FieldRequirementPolicy::question_for(FieldName::Age));

        // bare number stays attributed to the diet topic
        let second = orchestrator.handle_turn(request("u1", "22")).await.unwrap();
        assert_eq!(second.disposition, TurnDisposition::AskedField);
        assert_eq!(second.reply, FieldRequirementPolicy::question_for(FieldName::HeightCm));

        let user_id = resolve_user_id("u1").unwrap();
        let profile = store.load_profile(user_id).await.unwrap().unwrap();
        assert_eq!(profile.age, Some(22));

        let conversation = store.load_active_conversation(user_id).await.unwrap().unwrap();
        assert_eq!(conversation.phase, Phase::Diet);
        assert_eq!(conversation.transcript.len(), 4);
        assert_eq!(oracle.calls(OracleTask::Generation), 0);
    }

    #[tokio::test]
    async fn test_medical_violation_counts() {
        let store = Arc::new(InMemoryStateStore::new());
        let oracle = scripted(Some("unused"));
        let orchestrator = orchestrator(store.clone(), oracle.clone());

        let first = orchestrator
            .handle_turn(request("u1", "I have a fever, which tablet?"))
            .await
            .unwrap();
        let second = orchestrator
            .handle_turn(request("u1", "fever again, dosage?"))
            .await
            .unwrap();

        assert_eq!(first.disposition, TurnDisposition::Blocked);
        assert_eq!(second.disposition, TurnDisposition::Blocked);
        assert_ne!(first.reply, second.reply);

        let user_id = resolve_user_id("u1").unwrap();
        let counts = store
            .violation_counts(user_id, first.conversation_id)
            .await
            .unwrap();
        assert_eq!(counts.get(&ViolationCategory::Medical), Some(&2));

        let conversation = store.load_active_conversation(user_id).await.unwrap().unwrap();
        assert_eq!(conversation.phase, Phase::Persona);
        assert!(conversation
            .transcript
            .turns()
            .iter()
            .all(|turn| turn.role == TurnRole::User));
        assert_eq!(oracle.calls(OracleTask::Generation), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_stores_no_reply() {
        let store = Arc::new(InMemoryStateStore::new());
        let orchestrator = orchestrator(store.clone(), scripted(None));

        let reply = orchestrator
            .handle_turn(request("u1", "tell me something nice"))
            .await
            .unwrap();

        assert_eq!(reply.disposition, TurnDisposition::GenerationFailed);
        assert_eq!(reply.reply, GENERATION_FALLBACK);

        let user_id = resolve_user_id("u1").unwrap();
        let conversation = store.load_active_conversation(user_id).await.unwrap().unwrap();
        assert_eq!(conversation.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_compaction_past_threshold() {
        let store = Arc::new(InMemoryStateStore::new());
        let oracle = scripted(Some("ok"));
        let orchestrator = orchestrator(store.clone(), oracle.clone());

        let user_id = resolve_user_id("u1").unwrap();
        let conversation = ConversationState::new(user_id);
        store.create_conversation(&conversation).await.unwrap();
        for i in 0..40 {
            store
                .append_turn(conversation.conversation_id, &Turn::user(format!("old {}", i)))
                .await
                .unwrap();
        }

        let reply = orchestrator.handle_turn(request("u1", "hello")).await.unwrap();
        assert_eq!(reply.disposition, TurnDisposition::Answered);
        assert_eq!(oracle.calls(OracleTask::Summarization), 1);

        let conversation = store.load_active_conversation(user_id).await.unwrap().unwrap();
        assert_eq!(conversation.summary.as_deref(), Some("User chatted a lot."));
        // 30 kept after compaction, then the assistant reply
        assert_eq!(conversation.transcript.len(), 31);
        assert_eq!(conversation.transcript.turns()[0].content, "old 11");
    }
}
