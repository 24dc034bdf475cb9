//! Persona subsystem
//!
//! Profile model, oracle-backed extraction, the no-overwrite merge and the
//! per-topic requirement table.

pub mod extractor;
pub mod merge;
pub mod profile;
pub mod requirements;

pub use extractor::ProfileExtractor;
pub use merge::{merge, merge_into};
pub use profile::{
    ActivityLevel, AuxField, DietType, FieldName, FitnessGoal, Gender, PartialProfile, Profile,
};
pub use requirements::FieldRequirementPolicy;
