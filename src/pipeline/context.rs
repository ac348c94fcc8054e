//! Inbound message context.
//!
//! Wraps one transport delivery and derives the key used to recognise
//! retried deliveries of the same message.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::logging::structured::LogContext;

/// One message as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Reporting-party identifier (phone number or chat session id).
    pub session_id: String,
    pub body: String,
    /// Stamped by the service clock when the transport gives none.
    pub received_at: Option<DateTime<Utc>>,
    /// Transport-provided id, e.g. an SMS provider's message SID.
    pub message_id: Option<String>,
}

impl InboundMessage {
    pub fn new(session_id: &str, body: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            body: body.to_string(),
            received_at: None,
            message_id: None,
        }
    }

    /// Build from raw transport fields. An unparseable timestamp is dropped.
    pub fn from_transport(
        session_id: &str,
        body: &str,
        received_at: Option<&str>,
        message_id: Option<&str>,
    ) -> Self {
        let received_at = received_at.and_then(|ts| {
            DateTime::parse_from_rfc3339(ts)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Self {
            session_id: session_id.to_string(),
            body: body.to_string(),
            received_at,
            message_id: message_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }
    }

    pub fn with_message_id(mut self, message_id: &str) -> Self {
        self.message_id = Some(message_id.to_string());
        self
    }

    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = Some(at);
        self
    }

    /// Replay key: the transport id when present, else a fingerprint of
    /// sender, body and receive time. Without either there is nothing that
    /// distinguishes a retry from a genuine repeat, so no key.
    pub fn dedup_key(&self) -> Option<String> {
        if let Some(id) = &self.message_id {
            return Some(format!("id:{}", id));
        }
        self.received_at.map(|at| {
            let material = format!("{}\n{}\n{}", self.session_id, self.body, at.to_rfc3339());
            format!("fp:{}", compute_hash(&material))
        })
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.session_id)
    }
}

/// SHA-256 of the content, hex encoded.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash("test content");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_hash("test content"));
    }

    #[test]
    fn test_message_id_wins() {
        let msg = InboundMessage::from_transport(
            "+15550100",
            "help",
            Some("2024-03-01T22:00:00Z"),
            Some("SM123"),
        );
        assert_eq!(msg.dedup_key().as_deref(), Some("id:SM123"));
    }

    #[test]
    fn test_fingerprint_depends_on_time() {
        let a = InboundMessage::from_transport("+15550100", "YES", Some("2024-03-01T22:00:00Z"), None);
        let b = InboundMessage::from_transport("+15550100", "YES", Some("2024-03-01T22:05:00Z"), None);
        let a_key = a.dedup_key().unwrap();
        assert!(a_key.starts_with("fp:"));
        assert_ne!(Some(a_key), b.dedup_key());
    }

    #[test]
    fn test_no_key_without_id_or_time() {
        assert!(InboundMessage::new("+15550100", "YES").dedup_key().is_none());
    }

    #[test]
    fn test_bad_timestamp_and_blank_id_dropped() {
        let msg = InboundMessage::from_transport("s", "hi", Some("yesterday"), Some("  "));
        assert!(msg.received_at.is_none());
        assert!(msg.message_id.is_none());
    }
}
