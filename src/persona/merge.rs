//! Profile merge policy
//!
//! A field is written only when it is still empty and the incoming value
//! passes structural validation. Known values are never overwritten, which
//! makes the merge idempotent and monotonic.

use crate::persona::profile::{PartialProfile, Profile};
use std::ops::RangeInclusive;
use tracing::debug;

pub const AGE_RANGE: RangeInclusive<i64> = 12..=100;
pub const HEIGHT_CM_RANGE: RangeInclusive<i64> = 90..=250;
pub const WEIGHT_KG_RANGE: RangeInclusive<i64> = 30..=250;

/// Validates a raw number against a plausible human range
fn within<T: TryFrom<i64>>(value: Option<i64>, range: &RangeInclusive<i64>) -> Option<T> {
    value
        .filter(|v| range.contains(v))
        .and_then(|v| T::try_from(v).ok())
}

fn fill<T>(slot: &mut Option<T>, incoming: Option<T>) -> bool {
    if slot.is_none() && incoming.is_some() {
        *slot = incoming;
        true
    } else {
        false
    }
}

/// Merge a candidate update into a profile.
///
/// Returns `true` when at least one field was newly set.
pub fn merge_into(profile: &mut Profile, partial: &PartialProfile) -> bool {
    let mut changed = false;

    changed |= fill(&mut profile.age, within(partial.age, &AGE_RANGE));
    changed |= fill(&mut profile.height_cm, within(partial.height_cm, &HEIGHT_CM_RANGE));
    changed |= fill(&mut profile.weight_kg, within(partial.weight_kg, &WEIGHT_KG_RANGE));
    changed |= fill(&mut profile.gender, partial.gender);
    changed |= fill(&mut profile.goal, partial.goal);
    changed |= fill(&mut profile.diet_type, partial.diet_type);
    changed |= fill(&mut profile.activity_level, partial.activity_level);

    for (field, raw) in &partial.aux {
        if profile.aux.contains_key(field) {
            continue;
        }
        match field.normalize_value(raw) {
            Some(value) => {
                profile.aux.insert(*field, value);
                changed = true;
            }
            None => debug!(field = field.key(), "Discarding invalid auxiliary value"),
        }
    }

    changed
}

/// Pure form of [`merge_into`]
pub fn merge(profile: &Profile, partial: &PartialProfile) -> Profile {
    let mut merged = profile.clone();
    merge_into(&mut merged, partial);
    merged
}
