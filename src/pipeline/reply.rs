//! Reply composition.
//!
//! The guided reply is the flow state's script followed by what actually
//! happened with dispatch. The operator reply is an analysis block.

use serde::Serialize;

use crate::classification::{Classification, ClassificationSource};
use crate::conversation::{FlowState, Transition};

pub const NO_RESPONDER_TEXT: &str =
    "No volunteer is free right now. If you are in immediate danger, call 911.";

/// Dispatch result surfaced to the reporting party.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchNotice {
    NotRequired,
    Dispatched {
        responder_name: String,
        eta_minutes: u32,
    },
    EnRoute {
        responder_name: String,
        eta_minutes: u32,
        arrived: bool,
    },
    NoResponder,
}

impl DispatchNotice {
    fn survivor_line(&self) -> Option<String> {
        match self {
            DispatchNotice::NotRequired => None,
            DispatchNotice::Dispatched {
                responder_name,
                eta_minutes,
            } => Some(format!(
                "✓ Volunteer {} dispatched - ETA {} min",
                responder_name, eta_minutes
            )),
            DispatchNotice::EnRoute {
                responder_name,
                arrived: true,
                ..
            } => Some(format!("✓ Volunteer {} has reached your location", responder_name)),
            DispatchNotice::EnRoute {
                responder_name,
                eta_minutes,
                ..
            } => Some(format!(
                "✓ Volunteer {} is on the way - ETA {} min",
                responder_name, eta_minutes
            )),
            DispatchNotice::NoResponder => Some(NO_RESPONDER_TEXT.to_string()),
        }
    }

    fn operator_summary(&self) -> String {
        match self {
            DispatchNotice::NotRequired => "not required".to_string(),
            DispatchNotice::Dispatched {
                responder_name,
                eta_minutes,
            } => format!("created ({}, ETA {} min)", responder_name, eta_minutes),
            DispatchNotice::EnRoute {
                responder_name,
                arrived: true,
                ..
            } => format!("arrived ({})", responder_name),
            DispatchNotice::EnRoute {
                responder_name,
                eta_minutes,
                ..
            } => format!("en route ({}, ETA {} min)", responder_name, eta_minutes),
            DispatchNotice::NoResponder => "no responder available".to_string(),
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

pub fn guided(state: FlowState, classification: &Classification, notice: &DispatchNotice) -> String {
    let mut text = state.spec().response.to_string();

    let mut status: Vec<String> = notice.survivor_line().into_iter().collect();
    if classification.police_needed {
        status.push("🚔 Police escalation requested".to_string());
    }

    if !status.is_empty() {
        text.push_str("\n\n");
        text.push_str(&status.join("\n"));
    }
    text
}

pub fn operator(classification: &Classification, transition: &Transition, notice: &DispatchNotice) -> String {
    let presentation = classification.category.presentation();
    let intensity = classification
        .emotion_intensity
        .map(|i| format!(" ({}/10)", i))
        .unwrap_or_default();
    let source = match classification.source {
        ClassificationSource::Keyword => "keyword",
        ClassificationSource::Augmented => "keyword + ai",
    };

    let mut lines = vec![
        format!("{} ANALYSIS", presentation.emoji),
        format!("Category: {} ({})", presentation.label, classification.category),
        format!("Urgency: {}/10", classification.urgency_score),
        format!("Emotion: {}{}", classification.emotion.as_str(), intensity),
        format!("Police needed: {}", yes_no(classification.police_needed)),
        format!(
            "Community resolution: {}",
            yes_no(classification.community_resolution)
        ),
        format!("Action: {}", classification.recommended_action.as_str()),
        format!("Reasoning: {}", classification.reasoning),
        format!("Indicators: {}", classification.key_indicators.join(", ")),
        format!("Source: {}", source),
        format!(
            "Flow: {} -> {} ({})",
            transition.from, transition.to, transition.reason
        ),
        format!("Dispatch: {}", notice.operator_summary()),
    ];
    if let Some(suggested) = &classification.suggested_response {
        lines.push(format!("Suggested reply: {}", suggested));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::classify;
    use crate::conversation::TransitionReason;

    #[test]
    fn test_guided_no_responder_has_no_eta() {
        let c = classify("someone is following me");
        let text = guided(FlowState::Following, &c, &DispatchNotice::NoResponder);
        assert!(text.starts_with(FlowState::Following.spec().response));
        assert!(text.contains(NO_RESPONDER_TEXT));
        assert!(!text.contains("ETA"));
        assert!(!text.contains("dispatched"));
    }

    #[test]
    fn test_guided_dispatched_line() {
        let c = classify("someone is following me");
        let notice = DispatchNotice::Dispatched {
            responder_name: "Maya".to_string(),
            eta_minutes: 6,
        };
        let text = guided(FlowState::Following, &c, &notice);
        assert!(text.contains("✓ Volunteer Maya dispatched - ETA 6 min"));
        assert!(!text.contains("Police"));
    }

    #[test]
    fn test_guided_police_line() {
        let c = classify("there's a gun nearby");
        let text = guided(FlowState::Emergency, &c, &DispatchNotice::NotRequired);
        assert!(text.contains("Police escalation requested"));
    }

    #[test]
    fn test_operator_block() {
        let c = classify("there's a gun nearby");
        let transition = Transition {
            from: FlowState::Start,
            to: FlowState::Emergency,
            reason: TransitionReason::UrgencyOverride,
        };
        let text = operator(&c, &transition, &DispatchNotice::NoResponder);
        assert!(text.contains("Urgency: 10/10"));
        assert!(text.contains("Police needed: YES"));
        assert!(text.contains("Community resolution: NO"));
        assert!(text.contains("Action: dispatch_immediate"));
        assert!(text.contains("Flow: START -> EMERGENCY (urgency_override)"));
        assert!(text.contains("Dispatch: no responder available"));
    }
}
