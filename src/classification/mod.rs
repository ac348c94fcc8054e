//! Message triage.
//!
//! Maps free-text crisis messages to a classification record:
//! - Category, urgency, emotion (ordered keyword cascade)
//! - Police escalation and community-resolution flags (escalation policy)
//! - Recommended action derived from urgency
//! - Optional advisory AI augmentation with guaranteed keyword fallback

pub mod augmentation;
pub mod category;
pub mod classifier;
pub mod escalation;
#[cfg(feature = "gemini")]
pub mod gemini;

pub use augmentation::{classify_with_augmenter, parse_ai_payload, AiAnalysis, AugmentError, Augmenter};
pub use category::*;
pub use classifier::*;
