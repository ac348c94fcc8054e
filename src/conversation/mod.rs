//! Guided conversation state machine.

pub mod engine;
pub mod flows;
pub mod session;

pub use engine::{next_state, route_keywords, Transition, TransitionReason};
pub use flows::{fake_call_script, FlowAction, FlowState, StateSpec};
pub use session::{ConversationSession, HistoryEntry, Sender, SessionRegistry};
