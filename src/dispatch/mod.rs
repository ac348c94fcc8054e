//! Responder dispatch: selection, approach simulation and incident status.

pub mod clock;
pub mod coordinator;
pub mod incident;
pub mod responder;

pub use clock::{Clock, ManualClock, SystemClock, Ticker};
pub use coordinator::{Arrival, Dispatch, DispatchBoard, DispatchOutcome};
pub use incident::{Incident, IncidentStatus, StatusChange};
pub use responder::{select_responder, Location, Responder, Skill};
