//! Safety gate
//!
//! Blocking intents short-circuit every other check. Medical turns escalate
//! from a soft redirect to a firm refusal once the user has already been
//! redirected in this conversation.

use crate::models::{BlockReason, Intent, ViolationCategory, ViolationCounts};

const MEDICAL_REDIRECT: &str = "This sounds like a medical concern, and a doctor is the right \
person to check it properly. If you want help with diet, fitness or lifestyle around it, \
I'm right here.";

const MEDICAL_REFUSAL: &str = "I can't help with medical questions like diagnosis, medicines \
or dosages. Please consult a doctor for this one. Diet, fitness, skincare or lifestyle \
questions are always welcome.";

const OUT_OF_SCOPE: &str = "I can't help with this topic. If there's anything about health, \
diet, fitness or lifestyle you'd like to ask, go ahead.";

pub fn block_message(reason: BlockReason) -> &'static str {
    match reason {
        BlockReason::Medical { repeat: false } => MEDICAL_REDIRECT,
        BlockReason::Medical { repeat: true } => MEDICAL_REFUSAL,
        BlockReason::Sexual | BlockReason::Harmful => OUT_OF_SCOPE,
    }
}

/// Block reason for this intent, given prior violation counts
pub fn check(intent: Intent, prior: &ViolationCounts) -> Option<BlockReason> {
    match intent {
        Intent::Sexual => Some(BlockReason::Sexual),
        Intent::Harmful => Some(BlockReason::Harmful),
        Intent::Medical => {
            let seen = prior.get(&ViolationCategory::Medical).copied().unwrap_or(0);
            Some(BlockReason::Medical { repeat: seen > 0 })
        }
        _ => None,
    }
}
