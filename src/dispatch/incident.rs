//! Incidents and their status machine.
//!
//! `open -> accepted -> on_scene -> resolved`, plus `cancelled` from `open`
//! or `accepted`. Resolved and cancelled are terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::Classification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Accepted,
    OnScene,
    Resolved,
    Cancelled,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Accepted => "accepted",
            IncidentStatus::OnScene => "on_scene",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "open" => Some(IncidentStatus::Open),
            "accepted" => Some(IncidentStatus::Accepted),
            "on_scene" | "onscene" => Some(IncidentStatus::OnScene),
            "resolved" => Some(IncidentStatus::Resolved),
            "cancelled" | "canceled" => Some(IncidentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Cancelled)
    }

    /// Whether a responder is, or may still be, on the way.
    pub fn is_live(&self) -> bool {
        matches!(self, IncidentStatus::Open | IncidentStatus::Accepted)
    }

    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;
        matches!(
            (self, next),
            (Open, Accepted)
                | (Accepted, OnScene)
                | (OnScene, Resolved)
                | (Open, Cancelled)
                | (Accepted, Cancelled)
        )
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub id: String,
    pub session_id: String,
    /// Body of the message that opened the incident.
    pub message: String,
    pub classification: Classification,
    pub status: IncidentStatus,
    pub responder_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    pub fn new(session_id: &str, message: &str, classification: Classification, now: DateTime<Utc>) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("inc-{}", &id[..12]),
            session_id: session_id.to_string(),
            message: message.to_string(),
            classification,
            status: IncidentStatus::Open,
            responder_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Keep the most urgent classification seen for this incident.
    pub fn absorb(&mut self, classification: &Classification, now: DateTime<Utc>) -> bool {
        if classification.urgency_score > self.classification.urgency_score {
            self.classification = classification.clone();
            self.updated_at = now;
            true
        } else {
            false
        }
    }
}

/// An applied status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub incident_id: String,
    pub from: IncidentStatus,
    pub to: IncidentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::classify;

    #[test]
    fn test_legal_transitions() {
        use IncidentStatus::*;
        assert!(Open.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(OnScene));
        assert!(OnScene.can_transition_to(Resolved));
        assert!(Open.can_transition_to(Cancelled));
        assert!(Accepted.can_transition_to(Cancelled));

        assert!(!Open.can_transition_to(OnScene));
        assert!(!Open.can_transition_to(Resolved));
        assert!(!OnScene.can_transition_to(Cancelled));
        assert!(!Accepted.can_transition_to(Open));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use IncidentStatus::*;
        for terminal in [Resolved, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Open, Accepted, OnScene, Resolved, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(IncidentStatus::parse("on-scene"), Some(IncidentStatus::OnScene));
        assert_eq!(IncidentStatus::parse("Canceled"), Some(IncidentStatus::Cancelled));
        assert_eq!(IncidentStatus::parse("pending"), None);
    }

    #[test]
    fn test_incident_id_shape() {
        let incident = Incident::new("s", "help", classify("help"), Utc::now());
        assert!(incident.id.starts_with("inc-"));
        assert_eq!(incident.id.len(), 16);
        assert_eq!(incident.status, IncidentStatus::Open);
    }

    #[test]
    fn test_absorb_keeps_highest_urgency() {
        let now = Utc::now();
        let mut incident = Incident::new("s", "I feel unsafe", classify("I feel unsafe"), now);
        assert!(!incident.absorb(&classify("hello"), now));
        assert_eq!(incident.classification.urgency_score, 8);
        assert!(incident.absorb(&classify("he has a knife"), now));
        assert_eq!(incident.classification.urgency_score, 10);
    }
}
