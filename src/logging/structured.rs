//! Structured logging utilities.
//!
//! Provides context-aware logging with session and incident ids included
//! in every log message. Session ids are reporting-party phone numbers, so
//! they are masked before they reach a log line.

use std::fmt;

use crate::security::pii::mask_identifier;

/// Logging context for one conversation session.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub session: String,
    pub incident_id: Option<String>,
}

impl LogContext {
    pub fn new(session_id: &str) -> Self {
        Self {
            session: mask_identifier(session_id),
            incident_id: None,
        }
    }

    /// Context for operator actions and ticks that are not tied to a session.
    pub fn operator() -> Self {
        Self {
            session: "operator".to_string(),
            incident_id: None,
        }
    }

    pub fn with_incident(&self, incident_id: &str) -> Self {
        Self {
            session: self.session.clone(),
            incident_id: Some(incident_id.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.incident_id {
            Some(iid) => write!(f, "[session={}] [incident={}]", self.session, iid),
            None => write!(f, "[session={}]", self.session),
        }
    }
}

/// Initialize the process-wide logger.
///
/// Safe to call repeatedly; only the first call installs the backend.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

/// Log an info event with context and `key=value` pairs.
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::info!(
            "{} {}{}",
            $ctx,
            $event,
            {
                #[allow(unused_mut)]
                let mut fields = String::new();
                $(
                    fields.push_str(&format!(" {}={}", stringify!($key), $value));
                )*
                fields
            }
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new("+16475550199");
        assert_eq!(format!("{}", ctx), "[session=***0199]");

        let ctx_with_incident = ctx.with_incident("inc-1a2b3c4d");
        assert_eq!(
            format!("{}", ctx_with_incident),
            "[session=***0199] [incident=inc-1a2b3c4d]"
        );
    }

    #[test]
    fn test_operator_context() {
        let ctx = LogContext::operator().with_incident("inc-9");
        assert_eq!(format!("{}", ctx), "[session=operator] [incident=inc-9]");
    }

    #[test]
    fn test_log_event_macro_expands() {
        let ctx = LogContext::new("web-demo");
        crate::log_event!(ctx, "FLOW_TRANSITION", from = "START", to = "TALK");
        crate::log_event!(ctx, "MESSAGE_EMPTY");
    }
}
