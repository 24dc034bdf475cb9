//! Per-topic required profile fields
//!
//! Order matters: the first missing field in the list is the one asked about.

use crate::models::Topic;
use crate::persona::profile::{AuxField, FieldName, Profile};

const DIET_FIELDS: &[FieldName] = &[
    FieldName::Age,
    FieldName::HeightCm,
    FieldName::DietType,
    FieldName::ActivityLevel,
    FieldName::Goal,
];

const FITNESS_FIELDS: &[FieldName] = &[
    FieldName::Age,
    FieldName::ActivityLevel,
    FieldName::Goal,
];

const SKIN_FIELDS: &[FieldName] = &[FieldName::Aux(AuxField::SkinType)];

const HAIR_FIELDS: &[FieldName] = &[
    FieldName::Aux(AuxField::HairType),
    FieldName::Aux(AuxField::ScalpCondition),
    FieldName::Aux(AuxField::Dandruff),
    FieldName::Aux(AuxField::StressLevel),
    FieldName::Aux(AuxField::HairfallDuration),
];

/// Static topic → required fields table
pub struct FieldRequirementPolicy;

impl FieldRequirementPolicy {
    pub fn required_fields(topic: Option<Topic>) -> &'static [FieldName] {
        match topic {
            Some(Topic::Diet) => DIET_FIELDS,
            Some(Topic::Fitness) => FITNESS_FIELDS,
            Some(Topic::Skin) => SKIN_FIELDS,
            Some(Topic::Hair) => HAIR_FIELDS,
            Some(Topic::Lifestyle) | None => &[],
        }
    }

    /// Required fields the profile does not hold yet, in policy order
    pub fn missing_fields(topic: Option<Topic>, profile: &Profile) -> Vec<FieldName> {
        Self::required_fields(topic)
            .iter()
            .copied()
            .filter(|field| !profile.has(*field))
            .collect()
    }

    /// The single question used to fill a field
    pub fn question_for(field: FieldName) -> &'static str {
        match field {
            FieldName::Age => "Before I go deeper, how old are you?",
            FieldName::HeightCm => {
                "What's your height and weight? Something like 170 cm, 65 kg works."
            }
            FieldName::WeightKg => "Roughly how much do you weigh, in kg?",
            FieldName::DietType => "Do you follow a veg, non-veg, or eggitarian diet?",
            FieldName::ActivityLevel => {
                "How active are you usually, mostly desk-based or fairly active?"
            }
            FieldName::Goal => {
                "What's your main goal right now: fat loss, muscle gain, or just staying healthy?"
            }
            FieldName::Gender => "If you're comfortable sharing, what's your gender?",
            FieldName::Aux(AuxField::SkinType) => {
                "Do you know your skin type: oily, dry, or combination?"
            }
            FieldName::Aux(AuxField::HairType) => "Is your hair straight, wavy, or curly?",
            FieldName::Aux(AuxField::ScalpCondition) => {
                "How does your scalp usually feel: oily, dry, normal, or sensitive?"
            }
            FieldName::Aux(AuxField::Dandruff) => {
                "Do you get dandruff? Yes, no, or only sometimes?"
            }
            FieldName::Aux(AuxField::StressLevel) => {
                "How would you rate your stress lately: low, medium, or high?"
            }
            FieldName::Aux(AuxField::HairfallDuration) => {
                "Since when have you been noticing the hairfall?"
            }
        }
    }
}
