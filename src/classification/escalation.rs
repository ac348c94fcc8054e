//! Escalation policy.
//!
//! Police involvement and community-only resolution are mutually exclusive:
//! `police_needed` implies `!community_resolution`. Every code path that
//! builds or mutates a [`Classification`] finishes with [`enforce`], which
//! re-derives the dependent fields from the authoritative ones.

use crate::classification::category::RecommendedAction;
use crate::classification::classifier::Classification;

/// Clamp urgency to 1..=10 and re-derive the dependent fields.
pub fn enforce(classification: &mut Classification) {
    classification.urgency_score = classification.urgency_score.clamp(1, 10);
    if let Some(intensity) = classification.emotion_intensity {
        classification.emotion_intensity = Some(intensity.clamp(1, 10));
    }
    classification.community_resolution = !classification.police_needed;
    classification.recommended_action =
        RecommendedAction::for_urgency(classification.urgency_score);
}

/// Mark a classification as needing police and re-derive.
pub fn escalate_to_police(classification: &mut Classification, reason: &str) {
    classification.police_needed = true;
    if !classification.key_indicators.iter().any(|k| k == reason) {
        classification.key_indicators.push(reason.to_string());
    }
    enforce(classification);
}

/// Check the invariant without mutating.
pub fn holds(classification: &Classification) -> bool {
    !(classification.police_needed && classification.community_resolution)
        && classification.recommended_action
            == RecommendedAction::for_urgency(classification.urgency_score)
        && (1..=10).contains(&classification.urgency_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::category::Category;
    use crate::classification::classifier::classify;

    #[test]
    fn test_invariant_holds_for_every_category() {
        for category in Category::ALL {
            let c = Classification::from_category(category, None);
            assert!(holds(&c), "{}", category);
            if c.police_needed {
                assert!(!c.community_resolution, "{}", category);
            } else {
                assert!(c.community_resolution, "{}", category);
            }
        }
    }

    #[test]
    fn test_enforce_repairs_contradiction() {
        let mut c = classify("someone is following me");
        c.police_needed = true;
        assert!(c.community_resolution);
        assert!(!holds(&c));

        enforce(&mut c);
        assert!(!c.community_resolution);
        assert!(holds(&c));
    }

    #[test]
    fn test_enforce_clamps_urgency() {
        let mut c = classify("hello");
        c.urgency_score = 42;
        enforce(&mut c);
        assert_eq!(c.urgency_score, 10);
        assert_eq!(c.recommended_action, RecommendedAction::DispatchImmediate);

        c.urgency_score = 0;
        enforce(&mut c);
        assert_eq!(c.urgency_score, 1);
    }

    #[test]
    fn test_escalate_to_police() {
        let mut c = classify("guys keep catcalling");
        escalate_to_police(&mut c, "external escalation");
        assert!(c.police_needed);
        assert!(!c.community_resolution);
        assert!(c.key_indicators.contains(&"external escalation".to_string()));
    }
}
