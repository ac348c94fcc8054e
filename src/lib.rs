//! SafetyNet Core - crisis message triage and responder dispatch
//!
//! This crate classifies free-text crisis messages, drives a guided
//! conversation per reporting party and coordinates volunteer responders.
//! The implementation prioritizes:
//!
//! 1. **Safety** - A deterministic classification is always available;
//!    AI augmentation is advisory and bounded by a timeout
//! 2. **Logging** - Every decision point logged with session context
//! 3. **Consistency** - Per-session ordering, atomic incident transitions
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `classification` - Keyword cascade, escalation policy, AI augmentation
//! - `conversation` - Guided flow states, transition engine, sessions
//! - `dispatch` - Responder selection, distance decay, incident status
//! - `pipeline` - The triage service tying the above together
//! - `storage` - Snapshot records, persistence seam, statistics
//! - `security` - Body sanitisation and PII masking for logs
//! - `config` - Thresholds and simulation constants
//! - `logging` - Structured logging with session context
//!
//! ## Example
//!
//! ```
//! use safetynet_core::config::TriageConfig;
//! use safetynet_core::dispatch::Responder;
//! use safetynet_core::pipeline::{InboundMessage, MessageOutcome, TriageService};
//!
//! let service = TriageService::new(TriageConfig::default()).unwrap();
//! service.register_responder(Responder::new("v1", "Maya").with_rating(4.8)).unwrap();
//!
//! let outcome = service.process_message(&InboundMessage::new("+15550100", "someone is following me"));
//! match outcome {
//!     MessageOutcome::Handled(reply) => assert!(reply.text.contains("Volunteer Maya dispatched")),
//!     other => panic!("unexpected outcome: {:?}", other),
//! }
//! ```

pub mod classification;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod security;
pub mod storage;

#[cfg(feature = "python")]
mod python;

pub use classification::{classify, Classification};
pub use config::TriageConfig;
pub use error::{TriageError, TriageResult};
pub use pipeline::{InboundMessage, MessageOutcome, TriageService};
