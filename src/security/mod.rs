//! Security module.
//!
//! Provides inbound body sanitization and PII masking for log output.

pub mod pii;
pub mod sanitizer;

pub use pii::*;
pub use sanitizer::*;
