//! Snapshot records handed to the persistence collaborator and dashboards.
//!
//! Records are flat, serializable copies. Derived values such as the ETA
//! label are computed when the record is built and never read back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::{Category, Classification};
use crate::dispatch::{Dispatch, Incident, IncidentStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub incident_id: String,
    pub session_id: String,
    pub message: String,
    pub category: Category,
    pub urgency_score: u8,
    pub police_needed: bool,
    pub community_resolution: bool,
    pub status: IncidentStatus,
    pub responder_id: Option<String>,
    pub classification: Classification,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Incident> for IncidentRecord {
    fn from(incident: &Incident) -> Self {
        Self {
            incident_id: incident.id.clone(),
            session_id: incident.session_id.clone(),
            message: incident.message.clone(),
            category: incident.classification.category,
            urgency_score: incident.classification.urgency_score,
            police_needed: incident.classification.police_needed,
            community_resolution: incident.classification.community_resolution,
            status: incident.status,
            responder_id: incident.responder_id.clone(),
            classification: incident.classification.clone(),
            created_at: incident.created_at,
            updated_at: incident.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub incident_id: String,
    pub responder_id: String,
    pub responder_name: String,
    pub distance_remaining_km: f64,
    pub eta_minutes: u32,
    pub eta_label: String,
    pub arrived: bool,
    pub closed: bool,
    pub created_at: DateTime<Utc>,
}

impl DispatchRecord {
    pub fn from_dispatch(dispatch: &Dispatch, minutes_per_km: f64) -> Self {
        Self {
            incident_id: dispatch.incident_id.clone(),
            responder_id: dispatch.responder_id.clone(),
            responder_name: dispatch.responder_name.clone(),
            distance_remaining_km: dispatch.distance_remaining_km,
            eta_minutes: dispatch.eta_minutes(minutes_per_km),
            eta_label: dispatch.eta_label(minutes_per_km),
            arrived: dispatch.arrived,
            closed: dispatch.closed,
            created_at: dispatch.created_at,
        }
    }
}

/// Incident listing query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentFilter {
    pub status: Option<IncidentStatus>,
    pub session_id: Option<String>,
    pub limit: Option<usize>,
}

impl IncidentFilter {
    pub fn with_status(status: IncidentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &IncidentRecord) -> bool {
        self.status.map_or(true, |s| record.status == s)
            && self
                .session_id
                .as_deref()
                .map_or(true, |sid| record.session_id == sid)
    }

    /// Filter, order newest first, then apply the limit.
    pub fn apply(&self, records: impl IntoIterator<Item = IncidentRecord>) -> Vec<IncidentRecord> {
        let mut selected: Vec<IncidentRecord> = records.into_iter().filter(|r| self.matches(r)).collect();
        // Equal timestamps list later insertions first.
        selected.reverse();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::classify;
    use chrono::{Duration, TimeZone};

    fn record_at(minutes: i64, status: IncidentStatus) -> IncidentRecord {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap() + Duration::minutes(minutes);
        let mut incident = Incident::new("+15550100", "help", classify("help"), at);
        incident.status = status;
        IncidentRecord::from(&incident)
    }

    #[test]
    fn test_record_copies_classification_fields() {
        let incident = Incident::new("s", "he has a knife", classify("he has a knife"), Utc::now());
        let record = IncidentRecord::from(&incident);
        assert_eq!(record.category, Category::ArmedThreat);
        assert_eq!(record.urgency_score, 10);
        assert!(record.police_needed);
        assert!(!record.community_resolution);
    }

    #[test]
    fn test_filter_newest_first_with_limit() {
        let records = vec![
            record_at(0, IncidentStatus::Open),
            record_at(5, IncidentStatus::Resolved),
            record_at(10, IncidentStatus::Open),
            record_at(15, IncidentStatus::Open),
        ];
        let listed = IncidentFilter::with_status(IncidentStatus::Open).limit(2).apply(records);
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at > listed[1].created_at);
        assert!(listed.iter().all(|r| r.status == IncidentStatus::Open));
    }

    #[test]
    fn test_dispatch_record_eta() {
        let dispatch = Dispatch {
            incident_id: "inc-1".to_string(),
            responder_id: "v1".to_string(),
            responder_name: "Maya".to_string(),
            baseline_km: 2.4,
            distance_remaining_km: 2.4,
            arrived: false,
            closed: false,
            created_at: Utc::now(),
        };
        let record = DispatchRecord::from_dispatch(&dispatch, 2.5);
        assert_eq!(record.eta_minutes, 6);
        assert_eq!(record.eta_label, "6 min");
    }
}
