//! Gate engine for per-turn decisions
//!
//! Pure and deterministic: given the classified intent, the sticky phase,
//! the profile and prior violation counts it decides whether to block, ask
//! for exactly one profile field, or proceed to generation. Recording
//! violations and persisting the phase are left to the caller.
//!
//! SAFETY → TOPIC RESOLUTION → COMPLETENESS → PROCEED

pub mod safety;
pub mod violations;

pub use violations::ViolationTracker;

use crate::models::{GateDecision, Intent, Phase, Topic, ViolationCategory, ViolationCounts};
use crate::persona::{FieldRequirementPolicy, Profile};
use tracing::info;

/// Everything the gate looks at for one turn
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub intent: Intent,
    /// Main topic carried by this turn's message, if any
    pub topic: Option<Topic>,
    /// Phase before this turn
    pub phase: Phase,
    pub profile: &'a Profile,
    pub violations: &'a ViolationCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub decision: GateDecision,
    /// Phase after this turn. Unchanged on block.
    pub phase: Phase,
    /// Topic the completeness check ran against
    pub effective_topic: Option<Topic>,
    /// Category the caller must record
    pub violation: Option<ViolationCategory>,
}

pub struct GateEngine;

impl GateEngine {
    pub fn decide(input: &GateInput<'_>) -> GateOutcome {
        // === SAFETY ===
        if let Some(reason) = safety::check(input.intent, input.violations) {
            info!(intent = %input.intent, "Gate: blocked");
            return GateOutcome {
                decision: GateDecision::Block {
                    reason,
                    message: safety::block_message(reason).to_string(),
                },
                phase: input.phase,
                effective_topic: None,
                violation: input.intent.violation_category(),
            };
        }

        // === TOPIC RESOLUTION ===
        let (effective_topic, phase) = Self::resolve_topic(input.topic, input.phase, input.profile);

        // === COMPLETENESS ===
        let missing = FieldRequirementPolicy::missing_fields(effective_topic, input.profile);

        let decision = match missing.first() {
            Some(field) => {
                info!(
                    phase = %phase,
                    field = %field,
                    missing = missing.len(),
                    "Gate: asking for profile field"
                );
                GateDecision::AskField {
                    field: *field,
                    question: FieldRequirementPolicy::question_for(*field).to_string(),
                }
            }
            None => {
                info!(phase = %phase, "Gate: proceeding");
                GateDecision::Proceed {
                    profile: input.profile.clone(),
                    missing_fields: Vec::new(),
                }
            }
        };

        GateOutcome {
            decision,
            phase,
            effective_topic,
            violation: None,
        }
    }

    /// A main topic in this turn moves the phase; otherwise the topic in
    /// progress carries over so short answers like "22" stay attributed.
    ///
    /// Hair is a lifestyle sub-topic: while hair fields are still missing, a
    /// plain lifestyle turn (e.g. "high stress, can't sleep") answers the
    /// hair questions instead of leaving them.
    pub fn resolve_topic(
        topic: Option<Topic>,
        phase: Phase,
        profile: &Profile,
    ) -> (Option<Topic>, Phase) {
        match topic {
            Some(Topic::Lifestyle)
                if phase == Phase::Hair
                    && !FieldRequirementPolicy::missing_fields(Some(Topic::Hair), profile)
                        .is_empty() =>
            {
                (Some(Topic::Hair), Phase::Hair)
            }
            Some(topic) => (Some(topic), Phase::from(topic)),
            None => (phase.topic(), phase),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockReason;
    use crate::persona::{ActivityLevel, AuxField, DietType, FieldName, FitnessGoal};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn decide(intent: Intent, topic: Option<Topic>, phase: Phase, profile: &Profile) -> GateOutcome {
        let violations = ViolationCounts::new();
        GateEngine::decide(&GateInput {
            intent,
            topic,
            phase,
            profile,
            violations: &violations,
        })
    }

    fn asked_field(outcome: &GateOutcome) -> Option<FieldName> {
        match &outcome.decision {
            GateDecision::AskField { field, .. } => Some(*field),
            _ => None,
        }
    }

    fn complete_diet_profile() -> Profile {
        let mut profile = Profile::new(Uuid::new_v4());
        profile.age = Some(28);
        profile.height_cm = Some(172);
        profile.diet_type = Some(DietType::NonVeg);
        profile.activity_level = Some(ActivityLevel::Active);
        profile.goal = Some(FitnessGoal::MuscleGain);
        profile
    }

    #[test]
    fn test_diet_asks_age_then_height() {
        let mut profile = Profile::new(Uuid::new_v4());

        let outcome = decide(Intent::Diet, Some(Topic::Diet), Phase::Persona, &profile);
        assert_eq!(asked_field(&outcome), Some(FieldName::Age));
        assert_eq!(outcome.phase, Phase::Diet);

        profile.age = Some(22);
        let outcome = decide(Intent::Diet, Some(Topic::Diet), Phase::Diet, &profile);
        assert_eq!(asked_field(&outcome), Some(FieldName::HeightCm));
    }

    #[test]
    fn test_sticky_phase_for_short_reply() {
        let profile = Profile::new(Uuid::new_v4());

        let outcome = decide(Intent::OffTopic, None, Phase::Diet, &profile);
        assert_eq!(outcome.effective_topic, Some(Topic::Diet));
        assert_eq!(outcome.phase, Phase::Diet);
        assert_eq!(asked_field(&outcome), Some(FieldName::Age));
    }

    #[test]
    fn test_new_topic_replaces_phase() {
        let profile = complete_diet_profile();
        let outcome = decide(Intent::Skin, Some(Topic::Skin), Phase::Diet, &profile);

        assert_eq!(outcome.phase, Phase::Skin);
        assert_eq!(asked_field(&outcome), Some(FieldName::Aux(AuxField::SkinType)));
    }

    #[test]
    fn test_neutral_conversation_proceeds() {
        let profile = Profile::new(Uuid::new_v4());

        let outcome = decide(Intent::OffTopic, None, Phase::Persona, &profile);
        assert!(matches!(outcome.decision, GateDecision::Proceed { .. }));
        assert_eq!(outcome.phase, Phase::Persona);

        let outcome = decide(Intent::Lifestyle, Some(Topic::Lifestyle), Phase::Persona, &profile);
        assert!(matches!(outcome.decision, GateDecision::Proceed { .. }));
        assert_eq!(outcome.phase, Phase::Lifestyle);
    }

    #[test]
    fn test_complete_profile_never_reasks() {
        let mut profile = complete_diet_profile();
        let outcome = decide(Intent::Diet, Some(Topic::Diet), Phase::Diet, &profile);

        match outcome.decision {
            GateDecision::Proceed { profile: snapshot, missing_fields } => {
                assert_eq!(snapshot, profile);
                assert!(missing_fields.is_empty());
            }
            other => panic!("expected proceed, got {:?}", other),
        }

        profile.aux.insert(AuxField::StressLevel, "low".to_string());
        let outcome = decide(Intent::Diet, Some(Topic::Diet), Phase::Diet, &profile);
        assert!(matches!(outcome.decision, GateDecision::Proceed { .. }));
    }

    #[test]
    fn test_hair_requirements() {
        let mut profile = Profile::new(Uuid::new_v4());
        profile.aux.insert(AuxField::HairType, "wavy".to_string());

        let outcome = decide(Intent::Lifestyle, Some(Topic::Hair), Phase::Persona, &profile);
        assert_eq!(outcome.phase, Phase::Hair);
        assert_eq!(asked_field(&outcome), Some(FieldName::Aux(AuxField::ScalpCondition)));
    }

    #[test]
    fn test_lifestyle_reply_stays_in_unfinished_hair_phase() {
        let mut profile = Profile::new(Uuid::new_v4());
        profile.aux.insert(AuxField::HairType, "wavy".to_string());
        profile.aux.insert(AuxField::ScalpCondition, "oily".to_string());
        profile.aux.insert(AuxField::Dandruff, "no".to_string());

        let outcome = decide(Intent::Lifestyle, Some(Topic::Lifestyle), Phase::Hair, &profile);
        assert_eq!(outcome.phase, Phase::Hair);
        assert_eq!(outcome.effective_topic, Some(Topic::Hair));
        assert_eq!(asked_field(&outcome), Some(FieldName::Aux(AuxField::StressLevel)));

        profile.aux.insert(AuxField::StressLevel, "high".to_string());
        profile.aux.insert(AuxField::HairfallDuration, "3 months".to_string());
        let outcome = decide(Intent::Lifestyle, Some(Topic::Lifestyle), Phase::Hair, &profile);
        assert_eq!(outcome.phase, Phase::Lifestyle);
        assert!(matches!(outcome.decision, GateDecision::Proceed { .. }));
    }

    #[test]
    fn test_medical_block_reports_violation() {
        let profile = Profile::new(Uuid::new_v4());
        let outcome = decide(Intent::Medical, None, Phase::Diet, &profile);

        assert_eq!(outcome.violation, Some(ViolationCategory::Medical));
        assert_eq!(outcome.phase, Phase::Diet);
        assert!(matches!(
            outcome.decision,
            GateDecision::Block { reason: BlockReason::Medical { repeat: false }, .. }
        ));
    }

    #[test]
    fn test_medical_repeat_uses_prior_count() {
        let profile = Profile::new(Uuid::new_v4());
        let mut violations = ViolationCounts::new();
        violations.insert(ViolationCategory::Medical, 1);

        let outcome = GateEngine::decide(&GateInput {
            intent: Intent::Medical,
            topic: None,
            phase: Phase::Persona,
            profile: &profile,
            violations: &violations,
        });

        assert!(matches!(
            outcome.decision,
            GateDecision::Block { reason: BlockReason::Medical { repeat: true }, .. }
        ));
    }

    fn phase_strategy() -> impl Strategy<Value = Phase> {
        prop_oneof![
            Just(Phase::Persona),
            Just(Phase::Diet),
            Just(Phase::Fitness),
            Just(Phase::Hair),
            Just(Phase::Skin),
            Just(Phase::Lifestyle),
            Just(Phase::Complete),
        ]
    }

    fn profile_strategy() -> impl Strategy<Value = Profile> {
        (
            proptest::option::of(12u8..=100),
            proptest::option::of(90u16..=250),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(age, height_cm, veg, active, skin)| {
                let mut profile = Profile::new(Uuid::nil());
                profile.age = age;
                profile.height_cm = height_cm;
                profile.diet_type = veg.then_some(DietType::Vegetarian);
                profile.activity_level = active.then_some(ActivityLevel::Sedentary);
                if skin {
                    profile.aux.insert(AuxField::SkinType, "dry".to_string());
                }
                profile
            })
    }

    proptest! {
        #[test]
        fn prop_safety_precedence(
            index in 0usize..3,
            phase in phase_strategy(),
            profile in profile_strategy(),
            prior in 0u32..4,
        ) {
            let intent = [Intent::Sexual, Intent::Harmful, Intent::Medical][index];
            let mut violations = ViolationCounts::new();
            violations.insert(ViolationCategory::Medical, prior);

            let outcome = GateEngine::decide(&GateInput {
                intent,
                topic: None,
                phase,
                profile: &profile,
                violations: &violations,
            });

            let is_block = matches!(outcome.decision, GateDecision::Block { .. });
            prop_assert!(is_block);
            prop_assert_eq!(outcome.phase, phase);
        }

        #[test]
        fn prop_at_most_one_question(
            topic_index in 0usize..4,
            phase in phase_strategy(),
            profile in profile_strategy(),
        ) {
            let topic = [Topic::Diet, Topic::Fitness, Topic::Skin, Topic::Hair][topic_index];
            let outcome = decide(Intent::Diet, Some(topic), phase, &profile);
            let missing = FieldRequirementPolicy::missing_fields(Some(topic), &profile);

            match outcome.decision {
                GateDecision::AskField { field, .. } => {
                    prop_assert!(!missing.is_empty());
                    prop_assert_eq!(field, missing[0]);
                }
                GateDecision::Proceed { .. } => prop_assert!(missing.is_empty()),
                GateDecision::Block { .. } => prop_assert!(false, "unexpected block"),
            }
        }

        #[test]
        fn prop_sticky_topic(phase in phase_strategy(), profile in profile_strategy()) {
            let outcome = decide(Intent::OffTopic, None, phase, &profile);
            prop_assert_eq!(outcome.effective_topic, phase.topic());
            prop_assert_eq!(outcome.phase, phase);
        }
    }
}
