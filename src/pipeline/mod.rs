//! Pipeline orchestration module.
//!
//! The triage service that coordinates, per inbound message:
//! - Body sanitisation and replay detection
//! - Classification and escalation
//! - Conversation state transitions
//! - Incident and dispatch bookkeeping
//! - Reply composition and persistence

pub mod context;
pub mod dedup;
pub mod events;
pub mod reply;
pub mod service;
pub mod voice;

pub use context::*;
pub use events::TriageEvent;
pub use reply::DispatchNotice;
pub use service::{MessageOutcome, TriageReply, TriageService};
pub use voice::VoiceGateway;
