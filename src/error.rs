//! Crate error types.

use thiserror::Error;

use crate::dispatch::incident::IncidentStatus;

/// Errors returned by operator-facing operations.
///
/// Inbound message processing never surfaces these to the reporting party.
#[derive(Debug, Error, PartialEq)]
pub enum TriageError {
    #[error("unknown incident: {0}")]
    UnknownIncident(String),

    #[error("unknown responder: {0}")]
    UnknownResponder(String),

    #[error("responder already registered: {0}")]
    DuplicateResponder(String),

    #[error("illegal incident transition {from} -> {to} for {incident_id}")]
    IllegalTransition {
        incident_id: String,
        from: IncidentStatus,
        to: IncidentStatus,
    },

    #[error("incident {incident_id} is assigned to {assigned}, not {requested}")]
    ResponderMismatch {
        incident_id: String,
        assigned: String,
        requested: String,
    },

    #[error("responder {0} is unavailable, off duty or at capacity")]
    ResponderUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type TriageResult<T> = Result<T, TriageError>;
