//! Dispatch coordination.
//!
//! [`DispatchBoard`] owns incidents, responders and dispatch records. The
//! service keeps it behind a single mutex so every operator transition is
//! applied as one unit and readers never see a half-updated assignment.
//!
//! Dispatch creation leaves the incident `open`; a responder (or operator
//! on their behalf) moves it to `accepted` with an explicit accept.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::TriageConfig;
use crate::dispatch::incident::{Incident, IncidentStatus, StatusChange};
use crate::dispatch::responder::{select_responder, Responder};
use crate::error::{TriageError, TriageResult};

/// Live assignment of one responder to one incident.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dispatch {
    pub incident_id: String,
    pub responder_id: String,
    pub responder_name: String,
    pub baseline_km: f64,
    pub distance_remaining_km: f64,
    pub arrived: bool,
    /// Set once the incident is resolved or cancelled.
    pub closed: bool,
    pub created_at: DateTime<Utc>,
}

impl Dispatch {
    pub fn is_live(&self) -> bool {
        !self.closed
    }

    /// Minutes until arrival, derived from the remaining distance.
    pub fn eta_minutes(&self, minutes_per_km: f64) -> u32 {
        let minutes = (self.distance_remaining_km * minutes_per_km).ceil();
        if minutes <= 0.0 {
            0
        } else {
            minutes as u32
        }
    }

    pub fn eta_label(&self, minutes_per_km: f64) -> String {
        if self.arrived {
            "arrived".to_string()
        } else {
            format!("{} min", self.eta_minutes(minutes_per_km))
        }
    }

    /// One decay step. Returns true on the step that reaches zero.
    fn decay(&mut self, step_km: f64) -> bool {
        if self.arrived {
            return false;
        }
        self.distance_remaining_km = (self.distance_remaining_km - step_km).max(0.0);
        if self.distance_remaining_km <= 0.0 {
            self.distance_remaining_km = 0.0;
            self.arrived = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Created(Dispatch),
    /// The incident already has a live dispatch.
    Existing(Dispatch),
    NoResponder,
}

/// A dispatch whose distance reached zero during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Arrival {
    pub incident_id: String,
    pub responder_id: String,
}

#[derive(Debug, Default)]
pub struct DispatchBoard {
    incidents: HashMap<String, Incident>,
    incident_order: Vec<String>,
    responders: HashMap<String, Responder>,
    responder_order: Vec<String>,
    dispatches: HashMap<String, Dispatch>,
}

impl DispatchBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_responder(&mut self, responder: Responder) -> TriageResult<()> {
        if self.responders.contains_key(&responder.id) {
            return Err(TriageError::DuplicateResponder(responder.id));
        }
        self.responder_order.push(responder.id.clone());
        self.responders.insert(responder.id.clone(), responder);
        Ok(())
    }

    pub fn set_availability(&mut self, responder_id: &str, available: bool, on_duty: bool) -> TriageResult<&Responder> {
        let responder = self
            .responders
            .get_mut(responder_id)
            .ok_or_else(|| TriageError::UnknownResponder(responder_id.to_string()))?;
        responder.available = available;
        responder.on_duty = on_duty;
        Ok(&*responder)
    }

    pub fn responder(&self, responder_id: &str) -> Option<&Responder> {
        self.responders.get(responder_id)
    }

    /// Responders in registration order.
    pub fn responders(&self) -> impl Iterator<Item = &Responder> {
        self.responder_order
            .iter()
            .filter_map(move |id| self.responders.get(id))
    }

    pub fn insert_incident(&mut self, incident: Incident) {
        self.incident_order.push(incident.id.clone());
        self.incidents.insert(incident.id.clone(), incident);
    }

    pub fn incident(&self, incident_id: &str) -> Option<&Incident> {
        self.incidents.get(incident_id)
    }

    pub fn incident_mut(&mut self, incident_id: &str) -> Option<&mut Incident> {
        self.incidents.get_mut(incident_id)
    }

    /// Incidents in creation order.
    pub fn incidents(&self) -> impl Iterator<Item = &Incident> {
        self.incident_order
            .iter()
            .filter_map(move |id| self.incidents.get(id))
    }

    pub fn dispatch_for(&self, incident_id: &str) -> Option<&Dispatch> {
        self.dispatches.get(incident_id)
    }

    pub fn live_dispatch_for(&self, incident_id: &str) -> Option<&Dispatch> {
        self.dispatches.get(incident_id).filter(|d| d.is_live())
    }

    pub fn dispatches(&self) -> impl Iterator<Item = &Dispatch> {
        self.incident_order
            .iter()
            .filter_map(move |id| self.dispatches.get(id))
    }

    /// Assign the best eligible responder to an open incident.
    pub fn dispatch(&mut self, incident_id: &str, config: &TriageConfig, now: DateTime<Utc>) -> TriageResult<DispatchOutcome> {
        let incident = self
            .incidents
            .get(incident_id)
            .ok_or_else(|| TriageError::UnknownIncident(incident_id.to_string()))?;

        if let Some(existing) = self.live_dispatch_for(incident_id) {
            return Ok(DispatchOutcome::Existing(existing.clone()));
        }
        if incident.status != IncidentStatus::Open {
            return Err(TriageError::IllegalTransition {
                incident_id: incident_id.to_string(),
                from: incident.status,
                to: IncidentStatus::Open,
            });
        }

        let urgency = incident.classification.urgency_score;
        let Some(responder_id) = select_responder(self.responders()).map(|r| r.id.clone()) else {
            return Ok(DispatchOutcome::NoResponder);
        };

        Ok(DispatchOutcome::Created(self.assign(
            incident_id,
            &responder_id,
            config.baseline_km(urgency),
            now,
        )))
    }

    fn assign(&mut self, incident_id: &str, responder_id: &str, baseline_km: f64, now: DateTime<Utc>) -> Dispatch {
        let mut responder_name = String::new();
        if let Some(responder) = self.responders.get_mut(responder_id) {
            responder.active_incident_ids.insert(incident_id.to_string());
            responder_name = responder.name.clone();
        }
        if let Some(incident) = self.incidents.get_mut(incident_id) {
            incident.responder_id = Some(responder_id.to_string());
            incident.updated_at = now;
        }

        let dispatch = Dispatch {
            incident_id: incident_id.to_string(),
            responder_id: responder_id.to_string(),
            responder_name,
            baseline_km,
            distance_remaining_km: baseline_km,
            arrived: false,
            closed: false,
            created_at: now,
        };
        self.dispatches.insert(incident_id.to_string(), dispatch.clone());
        dispatch
    }

    /// Advance every live, en-route dispatch by `steps` decay steps.
    pub fn tick(&mut self, step_km: f64, steps: u32) -> Vec<Arrival> {
        let mut arrivals = Vec::new();
        if steps == 0 {
            return arrivals;
        }

        for id in &self.incident_order {
            let live_incident = self
                .incidents
                .get(id)
                .map(|i| i.status.is_live())
                .unwrap_or(false);
            let Some(dispatch) = self.dispatches.get_mut(id) else {
                continue;
            };
            if !live_incident || !dispatch.is_live() {
                continue;
            }

            for _ in 0..steps {
                if dispatch.decay(step_km) {
                    arrivals.push(Arrival {
                        incident_id: dispatch.incident_id.clone(),
                        responder_id: dispatch.responder_id.clone(),
                    });
                    break;
                }
            }
        }
        arrivals
    }

    /// Responder accepts an incident.
    ///
    /// Returns `None` when the same responder has already accepted it.
    pub fn accept(
        &mut self,
        incident_id: &str,
        responder_id: &str,
        config: &TriageConfig,
        now: DateTime<Utc>,
    ) -> TriageResult<Option<StatusChange>> {
        let incident = self
            .incidents
            .get(incident_id)
            .ok_or_else(|| TriageError::UnknownIncident(incident_id.to_string()))?;
        let responder = self
            .responders
            .get(responder_id)
            .ok_or_else(|| TriageError::UnknownResponder(responder_id.to_string()))?;

        if let Some(assigned) = incident.responder_id.as_deref() {
            if assigned != responder_id {
                return Err(TriageError::ResponderMismatch {
                    incident_id: incident_id.to_string(),
                    assigned: assigned.to_string(),
                    requested: responder_id.to_string(),
                });
            }
            if incident.status == IncidentStatus::Accepted {
                return Ok(None);
            }
        }

        if !incident.status.can_transition_to(IncidentStatus::Accepted) {
            return Err(TriageError::IllegalTransition {
                incident_id: incident_id.to_string(),
                from: incident.status,
                to: IncidentStatus::Accepted,
            });
        }

        if self.live_dispatch_for(incident_id).is_none() {
            if !responder.is_eligible() {
                return Err(TriageError::ResponderUnavailable(responder_id.to_string()));
            }
            let baseline = config.baseline_km(incident.classification.urgency_score);
            self.assign(incident_id, responder_id, baseline, now);
        }

        self.transition(incident_id, IncidentStatus::Accepted, now).map(Some)
    }

    /// Assigned responder reports arrival. Pins the distance at zero.
    ///
    /// The flag is true when this call, not a tick, produced the arrival.
    pub fn mark_on_scene(&mut self, incident_id: &str, responder_id: &str, now: DateTime<Utc>) -> TriageResult<(StatusChange, bool)> {
        let incident = self
            .incidents
            .get(incident_id)
            .ok_or_else(|| TriageError::UnknownIncident(incident_id.to_string()))?;

        match incident.responder_id.as_deref() {
            Some(assigned) if assigned == responder_id => {}
            Some(assigned) => {
                return Err(TriageError::ResponderMismatch {
                    incident_id: incident_id.to_string(),
                    assigned: assigned.to_string(),
                    requested: responder_id.to_string(),
                })
            }
            None => return Err(TriageError::UnknownResponder(responder_id.to_string())),
        }

        let change = self.transition(incident_id, IncidentStatus::OnScene, now)?;

        let mut newly_arrived = false;
        if let Some(dispatch) = self.dispatches.get_mut(incident_id) {
            newly_arrived = !dispatch.arrived;
            dispatch.distance_remaining_km = 0.0;
            dispatch.arrived = true;
        }
        Ok((change, newly_arrived))
    }

    pub fn resolve(&mut self, incident_id: &str, now: DateTime<Utc>) -> TriageResult<StatusChange> {
        let change = self.transition(incident_id, IncidentStatus::Resolved, now)?;
        self.release(incident_id);
        Ok(change)
    }

    pub fn cancel(&mut self, incident_id: &str, now: DateTime<Utc>) -> TriageResult<StatusChange> {
        let change = self.transition(incident_id, IncidentStatus::Cancelled, now)?;
        self.release(incident_id);
        Ok(change)
    }

    fn transition(&mut self, incident_id: &str, to: IncidentStatus, now: DateTime<Utc>) -> TriageResult<StatusChange> {
        let incident = self
            .incidents
            .get_mut(incident_id)
            .ok_or_else(|| TriageError::UnknownIncident(incident_id.to_string()))?;

        let from = incident.status;
        if !from.can_transition_to(to) {
            return Err(TriageError::IllegalTransition {
                incident_id: incident_id.to_string(),
                from,
                to,
            });
        }

        incident.status = to;
        incident.updated_at = now;
        Ok(StatusChange {
            incident_id: incident_id.to_string(),
            from,
            to,
        })
    }

    /// Close the dispatch and free the responder's slot.
    fn release(&mut self, incident_id: &str) {
        if let Some(dispatch) = self.dispatches.get_mut(incident_id) {
            dispatch.closed = true;
            if let Some(responder) = self.responders.get_mut(&dispatch.responder_id) {
                responder.active_incident_ids.remove(incident_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::classify;

    fn board_with(responders: Vec<Responder>) -> DispatchBoard {
        let mut board = DispatchBoard::new();
        for r in responders {
            board.register_responder(r).unwrap();
        }
        board
    }

    fn open(board: &mut DispatchBoard, text: &str) -> String {
        let incident = Incident::new("+15550100", text, classify(text), Utc::now());
        let id = incident.id.clone();
        board.insert_incident(incident);
        id
    }

    fn created(outcome: DispatchOutcome) -> Dispatch {
        match outcome {
            DispatchOutcome::Created(d) => d,
            other => panic!("expected a new dispatch, got {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_leaves_incident_open() {
        let config = TriageConfig::default();
        let mut board = board_with(vec![Responder::new("v1", "Maya").with_rating(4.8)]);
        let id = open(&mut board, "someone is following me");

        let dispatch = created(board.dispatch(&id, &config, Utc::now()).unwrap());
        assert_eq!(dispatch.responder_id, "v1");
        assert_eq!(dispatch.distance_remaining_km, 2.4);
        assert_eq!(board.incident(&id).unwrap().status, IncidentStatus::Open);
        assert!(board.responder("v1").unwrap().active_incident_ids.contains(&id));
    }

    #[test]
    fn test_critical_baseline() {
        let config = TriageConfig::default();
        let mut board = board_with(vec![Responder::new("v1", "Maya")]);
        let id = open(&mut board, "he has a knife");
        let dispatch = created(board.dispatch(&id, &config, Utc::now()).unwrap());
        assert_eq!(dispatch.baseline_km, 1.5);
        assert_eq!(dispatch.eta_minutes(config.eta_minutes_per_km), 4);
    }

    #[test]
    fn test_second_dispatch_returns_existing() {
        let config = TriageConfig::default();
        let mut board = board_with(vec![Responder::new("v1", "Maya").with_capacity(3)]);
        let id = open(&mut board, "someone is following me");
        created(board.dispatch(&id, &config, Utc::now()).unwrap());
        assert!(matches!(
            board.dispatch(&id, &config, Utc::now()).unwrap(),
            DispatchOutcome::Existing(_)
        ));
    }

    #[test]
    fn test_no_responder() {
        let config = TriageConfig::default();
        let mut board = board_with(vec![]);
        let id = open(&mut board, "someone is following me");
        assert_eq!(
            board.dispatch(&id, &config, Utc::now()).unwrap(),
            DispatchOutcome::NoResponder
        );
        assert_eq!(board.incident(&id).unwrap().status, IncidentStatus::Open);
        assert!(board.dispatch_for(&id).is_none());
    }

    #[test]
    fn test_capacity_blocks_second_incident() {
        let config = TriageConfig::default();
        let mut board = board_with(vec![Responder::new("v1", "Maya")]);
        let first = open(&mut board, "someone is following me");
        let second = open(&mut board, "I feel unsafe");
        created(board.dispatch(&first, &config, Utc::now()).unwrap());
        assert_eq!(
            board.dispatch(&second, &config, Utc::now()).unwrap(),
            DispatchOutcome::NoResponder
        );
    }

    #[test]
    fn test_tick_decays_and_arrives() {
        let config = TriageConfig::default();
        let mut board = board_with(vec![Responder::new("v1", "Maya")]);
        let id = open(&mut board, "he has a knife");
        created(board.dispatch(&id, &config, Utc::now()).unwrap());

        let mut last = f64::MAX;
        let mut arrivals = Vec::new();
        for _ in 0..20 {
            arrivals.extend(board.tick(config.tick_step_km, 1));
            let d = board.dispatch_for(&id).unwrap().distance_remaining_km;
            assert!(d <= last);
            assert!(d >= 0.0);
            last = d;
        }
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].incident_id, id);
        let dispatch = board.dispatch_for(&id).unwrap();
        assert!(dispatch.arrived);
        assert_eq!(dispatch.distance_remaining_km, 0.0);
        assert_eq!(dispatch.eta_label(config.eta_minutes_per_km), "arrived");
    }

    #[test]
    fn test_full_status_cycle_pins_distance() {
        let config = TriageConfig::default();
        let now = Utc::now();
        let mut board = board_with(vec![Responder::new("v1", "Maya")]);
        let id = open(&mut board, "someone is following me");
        created(board.dispatch(&id, &config, now).unwrap());

        let accepted = board.accept(&id, "v1", &config, now).unwrap().unwrap();
        assert_eq!((accepted.from, accepted.to), (IncidentStatus::Open, IncidentStatus::Accepted));
        assert_eq!(board.accept(&id, "v1", &config, now).unwrap(), None);

        let (on_scene, newly) = board.mark_on_scene(&id, "v1", now).unwrap();
        assert_eq!(on_scene.to, IncidentStatus::OnScene);
        assert!(newly);
        assert_eq!(board.dispatch_for(&id).unwrap().distance_remaining_km, 0.0);

        let resolved = board.resolve(&id, now).unwrap();
        assert_eq!(resolved.to, IncidentStatus::Resolved);
        let dispatch = board.dispatch_for(&id).unwrap();
        assert_eq!(dispatch.distance_remaining_km, 0.0);
        assert!(dispatch.closed);
        assert!(board.responder("v1").unwrap().active_incident_ids.is_empty());
    }

    #[test]
    fn test_accept_mismatch() {
        let config = TriageConfig::default();
        let mut board = board_with(vec![
            Responder::new("v1", "Maya").with_rating(5.0),
            Responder::new("v2", "Jordan"),
        ]);
        let id = open(&mut board, "someone is following me");
        created(board.dispatch(&id, &config, Utc::now()).unwrap());
        assert!(matches!(
            board.accept(&id, "v2", &config, Utc::now()),
            Err(TriageError::ResponderMismatch { .. })
        ));
    }

    #[test]
    fn test_accept_without_dispatch_assigns() {
        let config = TriageConfig::default();
        let mut board = board_with(vec![Responder::new("v1", "Maya")]);
        let id = open(&mut board, "hello");
        board.accept(&id, "v1", &config, Utc::now()).unwrap();
        assert_eq!(board.incident(&id).unwrap().status, IncidentStatus::Accepted);
        assert_eq!(board.dispatch_for(&id).unwrap().responder_id, "v1");
    }

    #[test]
    fn test_accept_by_unavailable_responder() {
        let config = TriageConfig::default();
        let mut board = board_with(vec![Responder::new("v1", "Maya")]);
        board.set_availability("v1", false, true).unwrap();
        let id = open(&mut board, "hello");
        assert_eq!(
            board.accept(&id, "v1", &config, Utc::now()),
            Err(TriageError::ResponderUnavailable("v1".to_string()))
        );
    }

    #[test]
    fn test_illegal_transitions() {
        let now = Utc::now();
        let mut board = board_with(vec![Responder::new("v1", "Maya")]);
        let id = open(&mut board, "hello");
        assert!(matches!(
            board.resolve(&id, now),
            Err(TriageError::IllegalTransition { from: IncidentStatus::Open, to: IncidentStatus::Resolved, .. })
        ));
        board.cancel(&id, now).unwrap();
        assert!(board.cancel(&id, now).is_err());
    }

    #[test]
    fn test_cancel_frees_responder_and_stops_decay() {
        let config = TriageConfig::default();
        let now = Utc::now();
        let mut board = board_with(vec![Responder::new("v1", "Maya")]);
        let id = open(&mut board, "someone is following me");
        created(board.dispatch(&id, &config, now).unwrap());
        board.cancel(&id, now).unwrap();

        assert!(board.responder("v1").unwrap().is_eligible());
        let before = board.dispatch_for(&id).unwrap().distance_remaining_km;
        board.tick(config.tick_step_km, 5);
        assert_eq!(board.dispatch_for(&id).unwrap().distance_remaining_km, before);
    }

    #[test]
    fn test_duplicate_responder() {
        let mut board = board_with(vec![Responder::new("v1", "Maya")]);
        assert_eq!(
            board.register_responder(Responder::new("v1", "Other")),
            Err(TriageError::DuplicateResponder("v1".to_string()))
        );
    }
}
