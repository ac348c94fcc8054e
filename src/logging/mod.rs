//! Structured logging with session context.
//!
//! Provides the log context and event macro that include the (masked)
//! session id and incident id in every log message for easy correlation.

pub mod structured;

pub use structured::*;
