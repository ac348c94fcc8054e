//! Conversation transition logic.
//!
//! Picks the next flow state for each inbound message.
//!
//! # Decision Tree
//! 1. Urgency at or above the override level -> EMERGENCY
//! 2. Exact option key of the current state -> mapped state
//! 3. Keyword router over the raw text -> routed state
//! 4. Otherwise -> TALK

use std::fmt;

use serde::Serialize;

use crate::classification::Classification;
use crate::conversation::flows::FlowState;
use crate::logging::structured::LogContext;

/// Why a transition was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    UrgencyOverride,
    OptionMatch,
    KeywordRoute,
    Default,
}

impl TransitionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionReason::UrgencyOverride => "urgency_override",
            TransitionReason::OptionMatch => "option_match",
            TransitionReason::KeywordRoute => "keyword_route",
            TransitionReason::Default => "default",
        }
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: FlowState,
    pub to: FlowState,
    pub reason: TransitionReason,
}

enum Match {
    Contains(&'static str),
    /// Whole word, so "BAR" does not fire on "embarrassed".
    Word(&'static str),
}

struct Route {
    keywords: &'static [Match],
    target: FlowState,
}

/// Free-text router, first match wins.
static ROUTES: &[Route] = &[
    Route {
        keywords: &[
            Match::Contains("EMERGENCY"),
            Match::Contains("911"),
            Match::Contains("KILL"),
            Match::Word("GUN"),
            Match::Contains("KNIFE"),
        ],
        target: FlowState::Emergency,
    },
    Route {
        keywords: &[Match::Contains("UNSAFE"), Match::Contains("NOT SAFE")],
        target: FlowState::UnsafeLocation,
    },
    Route {
        keywords: &[
            Match::Contains("FOLLOW"),
            Match::Contains("SCARED"),
            Match::Word("HELP"),
        ],
        target: FlowState::Following,
    },
    Route {
        keywords: &[Match::Contains("CALL")],
        target: FlowState::FakeCall,
    },
    Route {
        keywords: &[
            Match::Contains("ESCORT"),
            Match::Contains("WALK"),
            Match::Contains("DISPATCH"),
        ],
        target: FlowState::Escort,
    },
    Route {
        keywords: &[Match::Word("TALK")],
        target: FlowState::Talk,
    },
    Route {
        keywords: &[Match::Contains("HARASS"), Match::Contains("CATCALL")],
        target: FlowState::UnsafeLocation,
    },
    Route {
        keywords: &[Match::Contains("DRUNK"), Match::Word("BAR")],
        target: FlowState::BarExit,
    },
    Route {
        keywords: &[Match::Word("HOME"), Match::Contains("ALONE")],
        target: FlowState::GuardianAngel,
    },
    Route {
        keywords: &[Match::Word("BUS"), Match::Contains("WAITING")],
        target: FlowState::BusStop,
    },
];

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

/// Route free text that did not match an option key.
pub fn route_keywords(text: &str) -> Option<FlowState> {
    let upper = text.trim().to_uppercase();

    match upper.as_str() {
        "9" => return Some(FlowState::Emergency),
        "SAFE" | "I'M SAFE" | "IM SAFE" | "ARRIVED" => return Some(FlowState::Resolved),
        _ => {}
    }

    ROUTES
        .iter()
        .find(|route| {
            route.keywords.iter().any(|k| match k {
                Match::Contains(needle) => upper.contains(needle),
                Match::Word(word) => words(&upper).any(|w| w == *word),
            })
        })
        .map(|route| route.target)
}

/// Decide the next state for one message.
pub fn next_state(
    current: FlowState,
    text: &str,
    classification: &Classification,
    override_urgency: u8,
    ctx: &LogContext,
) -> Transition {
    let (to, reason) = if classification.urgency_score >= override_urgency {
        (FlowState::Emergency, TransitionReason::UrgencyOverride)
    } else if let Some(next) = current.spec().option(text) {
        (next, TransitionReason::OptionMatch)
    } else if let Some(next) = route_keywords(text) {
        (next, TransitionReason::KeywordRoute)
    } else {
        (FlowState::Talk, TransitionReason::Default)
    };

    crate::log_event!(
        ctx,
        "FLOW_TRANSITION",
        from = current,
        to = to,
        reason = reason,
        urgency = classification.urgency_score,
    );

    Transition {
        from: current,
        to,
        reason,
    }
}
