//! Persistence seam.
//!
//! The triage service writes snapshots through [`IncidentStore`] after each
//! committed change. A failed write is logged and never rolls back or
//! blocks the in-memory state, so a retried delivery replays cleanly.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use crate::dispatch::Responder;
use crate::storage::models::{DispatchRecord, IncidentFilter, IncidentRecord};
use crate::storage::stats::{self, IncidentStats};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record rejected: {0}")]
    Rejected(String),
}

pub trait IncidentStore: Send + Sync {
    fn save_incident(&self, record: &IncidentRecord) -> Result<(), StoreError>;
    fn save_dispatch(&self, record: &DispatchRecord) -> Result<(), StoreError>;
    fn save_responder(&self, responder: &Responder) -> Result<(), StoreError>;

    fn incident(&self, incident_id: &str) -> Result<Option<IncidentRecord>, StoreError>;
    fn dispatch(&self, incident_id: &str) -> Result<Option<DispatchRecord>, StoreError>;
    fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentRecord>, StoreError>;

    /// Aggregates over every stored incident.
    fn stats(&self) -> Result<IncidentStats, StoreError> {
        let all = self.list_incidents(&IncidentFilter::default())?;
        Ok(stats::compute(&all))
    }
}

/// Process-local store, keyed by id. Upserts replace the previous snapshot.
#[derive(Default)]
pub struct MemoryStore {
    incidents: RwLock<HashMap<String, IncidentRecord>>,
    dispatches: RwLock<HashMap<String, DispatchRecord>>,
    responders: RwLock<HashMap<String, Responder>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responder(&self, responder_id: &str) -> Option<Responder> {
        self.responders.read().get(responder_id).cloned()
    }

    pub fn incident_count(&self) -> usize {
        self.incidents.read().len()
    }
}

impl IncidentStore for MemoryStore {
    fn save_incident(&self, record: &IncidentRecord) -> Result<(), StoreError> {
        if record.incident_id.is_empty() {
            return Err(StoreError::Rejected("incident without id".to_string()));
        }
        self.incidents
            .write()
            .insert(record.incident_id.clone(), record.clone());
        Ok(())
    }

    fn save_dispatch(&self, record: &DispatchRecord) -> Result<(), StoreError> {
        self.dispatches
            .write()
            .insert(record.incident_id.clone(), record.clone());
        Ok(())
    }

    fn save_responder(&self, responder: &Responder) -> Result<(), StoreError> {
        self.responders
            .write()
            .insert(responder.id.clone(), responder.clone());
        Ok(())
    }

    fn incident(&self, incident_id: &str) -> Result<Option<IncidentRecord>, StoreError> {
        Ok(self.incidents.read().get(incident_id).cloned())
    }

    fn dispatch(&self, incident_id: &str) -> Result<Option<DispatchRecord>, StoreError> {
        Ok(self.dispatches.read().get(incident_id).cloned())
    }

    fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentRecord>, StoreError> {
        let snapshot: Vec<IncidentRecord> = self.incidents.read().values().cloned().collect();
        Ok(filter.apply(snapshot))
    }
}
