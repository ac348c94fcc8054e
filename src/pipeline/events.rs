//! Status-change events for real-time consumers.

use serde::Serialize;

use crate::classification::Category;
use crate::conversation::FlowState;
use crate::dispatch::IncidentStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriageEvent {
    IncidentOpened {
        incident_id: String,
        category: Category,
        urgency: u8,
        police_needed: bool,
    },
    DispatchCreated {
        incident_id: String,
        responder_id: String,
        eta_minutes: u32,
    },
    NoResponderAvailable {
        incident_id: String,
    },
    ResponderArrived {
        incident_id: String,
        responder_id: String,
    },
    StatusChanged {
        incident_id: String,
        from: IncidentStatus,
        to: IncidentStatus,
    },
    FakeCallRequested {
        session_id: String,
        state: FlowState,
    },
}

impl TriageEvent {
    pub fn incident_id(&self) -> Option<&str> {
        match self {
            TriageEvent::IncidentOpened { incident_id, .. }
            | TriageEvent::DispatchCreated { incident_id, .. }
            | TriageEvent::NoResponderAvailable { incident_id }
            | TriageEvent::ResponderArrived { incident_id, .. }
            | TriageEvent::StatusChanged { incident_id, .. } => Some(incident_id),
            TriageEvent::FakeCallRequested { .. } => None,
        }
    }
}
