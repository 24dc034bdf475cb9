//! User profile model
//!
//! One profile per user. Scalar attributes are typed; auxiliary attributes
//! live in a map keyed by the closed [`AuxField`] set so no free-form key can
//! ever be inserted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Lower-cases a label and folds spaces/hyphens into underscores.
fn fold_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

//
// ================= Scalar Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "male" | "man" | "m" => Some(Gender::Male),
            "female" | "woman" | "f" => Some(Gender::Female),
            "other" | "non_binary" | "nonbinary" => Some(Gender::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FitnessGoal {
    FatLoss,
    MuscleGain,
    GeneralHealth,
}

impl FitnessGoal {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "fat_loss" | "weight_loss" => Some(FitnessGoal::FatLoss),
            "muscle_gain" | "weight_gain" => Some(FitnessGoal::MuscleGain),
            "general_health" | "staying_healthy" => Some(FitnessGoal::GeneralHealth),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FitnessGoal::FatLoss => "fat_loss",
            FitnessGoal::MuscleGain => "muscle_gain",
            FitnessGoal::GeneralHealth => "general_health",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DietType {
    Vegetarian,
    NonVeg,
    Eggitarian,
}

impl DietType {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "vegetarian" | "veg" => Some(DietType::Vegetarian),
            "non_veg" | "nonveg" | "non_vegetarian" => Some(DietType::NonVeg),
            "eggitarian" | "egg" | "eggetarian" => Some(DietType::Eggitarian),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DietType::Vegetarian => "vegetarian",
            DietType::NonVeg => "non_veg",
            DietType::Eggitarian => "eggitarian",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Active,
}

impl ActivityLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "sedentary" | "desk_based" | "desk_job" => Some(ActivityLevel::Sedentary),
            "active" | "fairly_active" | "very_active" => Some(ActivityLevel::Active),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Active => "active",
        }
    }
}

//
// ================= Auxiliary Attributes =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuxField {
    SkinType,
    HairType,
    ScalpCondition,
    Dandruff,
    StressLevel,
    HairfallDuration,
}

const MAX_FREE_TEXT_LEN: usize = 60;

impl AuxField {
    pub const ALL: [AuxField; 6] = [
        AuxField::SkinType,
        AuxField::HairType,
        AuxField::ScalpCondition,
        AuxField::Dandruff,
        AuxField::StressLevel,
        AuxField::HairfallDuration,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AuxField::SkinType => "skin_type",
            AuxField::HairType => "hair_type",
            AuxField::ScalpCondition => "scalp_condition",
            AuxField::Dandruff => "dandruff",
            AuxField::StressLevel => "stress_level",
            AuxField::HairfallDuration => "hairfall_duration",
        }
    }

    /// Normalizes a raw value into this field's vocabulary.
    ///
    /// Returns `None` when the value does not belong to the field.
    pub fn normalize_value(&self, raw: &str) -> Option<String> {
        let folded = fold_label(raw);
        let allowed: &[&str] = match self {
            AuxField::SkinType => &["oily", "dry", "combination", "normal", "sensitive"],
            AuxField::HairType => &["straight", "wavy", "curly", "coily"],
            AuxField::ScalpCondition => &["oily", "dry", "normal", "sensitive"],
            AuxField::Dandruff => &["yes", "no", "sometimes"],
            AuxField::StressLevel => {
                if folded == "moderate" {
                    return Some("medium".to_string());
                }
                &["low", "medium", "high"]
            }
            AuxField::HairfallDuration => {
                let text = raw.trim();
                if text.is_empty() || text.chars().count() > MAX_FREE_TEXT_LEN {
                    return None;
                }
                return Some(text.to_string());
            }
        };

        allowed
            .iter()
            .find(|value| **value == folded)
            .map(|value| value.to_string())
    }
}

//
// ================= Field Names =================
//

/// Every profile attribute the requirement policy can ask about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Age,
    Gender,
    Goal,
    DietType,
    ActivityLevel,
    HeightCm,
    WeightKg,
    Aux(AuxField),
}

impl FieldName {
    pub fn key(&self) -> &'static str {
        match self {
            FieldName::Age => "age",
            FieldName::Gender => "gender",
            FieldName::Goal => "goal",
            FieldName::DietType => "diet_type",
            FieldName::ActivityLevel => "activity_level",
            FieldName::HeightCm => "height_cm",
            FieldName::WeightKg => "weight_kg",
            FieldName::Aux(aux) => aux.key(),
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

//
// ================= Profile =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub user_id: Uuid,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub goal: Option<FitnessGoal>,
    pub diet_type: Option<DietType>,
    pub activity_level: Option<ActivityLevel>,
    pub height_cm: Option<u16>,
    pub weight_kg: Option<u16>,
    #[serde(default)]
    pub aux: BTreeMap<AuxField, String>,
}

impl Profile {
    /// Empty profile, created lazily on a user's first message
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            age: None,
            gender: None,
            goal: None,
            diet_type: None,
            activity_level: None,
            height_cm: None,
            weight_kg: None,
            aux: BTreeMap::new(),
        }
    }

    pub fn has(&self, field: FieldName) -> bool {
        match field {
            FieldName::Age => self.age.is_some(),
            FieldName::Gender => self.gender.is_some(),
            FieldName::Goal => self.goal.is_some(),
            FieldName::DietType => self.diet_type.is_some(),
            FieldName::ActivityLevel => self.activity_level.is_some(),
            FieldName::HeightCm => self.height_cm.is_some(),
            FieldName::WeightKg => self.weight_kg.is_some(),
            FieldName::Aux(aux) => self.aux.contains_key(&aux),
        }
    }

    /// All fields currently holding a value
    pub fn known_fields(&self) -> Vec<FieldName> {
        let scalars = [
            FieldName::Age,
            FieldName::Gender,
            FieldName::Goal,
            FieldName::DietType,
            FieldName::ActivityLevel,
            FieldName::HeightCm,
            FieldName::WeightKg,
        ];

        scalars
            .into_iter()
            .chain(AuxField::ALL.into_iter().map(FieldName::Aux))
            .filter(|field| self.has(*field))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.known_fields().is_empty()
    }
}

/// Candidate update produced by the extractor.
///
/// Enum values are already parsed; numeric and auxiliary values are still raw
/// and only become profile data after passing validation in the merge step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialProfile {
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub goal: Option<FitnessGoal>,
    pub diet_type: Option<DietType>,
    pub activity_level: Option<ActivityLevel>,
    pub height_cm: Option<i64>,
    pub weight_kg: Option<i64>,
    pub aux: BTreeMap<AuxField, String>,
}

impl PartialProfile {
    pub fn is_empty(&self) -> bool {
        self == &PartialProfile::default()
    }
}
