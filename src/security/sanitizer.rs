//! Inbound message sanitization.
//!
//! Normalizes message bodies delivered by the transport before they reach
//! the classifier:
//! - Leading/trailing whitespace trimmed
//! - Control characters removed (newlines and tabs survive)
//! - Bodies longer than the configured limit truncated on a char boundary

use crate::logging::structured::LogContext;

/// Hard upper bound regardless of configuration (concatenated SMS segments).
pub const MAX_BODY_CHARS: usize = 10_000;

/// Result of sanitizing one inbound body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedBody {
    pub text: String,
    pub control_chars_removed: usize,
    pub truncated: bool,
}

impl SanitizedBody {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Sanitize a message body.
///
/// `max_chars` is clamped to [`MAX_BODY_CHARS`].
pub fn sanitize_body(body: &str, max_chars: usize, ctx: &LogContext) -> SanitizedBody {
    let limit = max_chars.min(MAX_BODY_CHARS);

    let mut removed = 0;
    let cleaned: String = body
        .chars()
        .filter(|c| {
            let keep = !c.is_control() || *c == '\n' || *c == '\t';
            if !keep {
                removed += 1;
            }
            keep
        })
        .collect();

    let trimmed = cleaned.trim();
    let char_count = trimmed.chars().count();
    let truncated = char_count > limit;

    let text = if truncated {
        trimmed.chars().take(limit).collect::<String>().trim_end().to_string()
    } else {
        trimmed.to_string()
    };

    if removed > 0 || truncated {
        log::warn!(
            "{} BODY_SANITIZED control_chars_removed={} truncated={} original_chars={} limit={}",
            ctx,
            removed,
            truncated,
            char_count,
            limit
        );
    }

    SanitizedBody {
        text,
        control_chars_removed: removed,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> LogContext {
        LogContext::new("test-session")
    }

    #[test]
    fn test_trims_whitespace() {
        let result = sanitize_body("   help me  \n", 1600, &ctx());
        assert_eq!(result.text, "help me");
        assert!(!result.truncated);
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let result = sanitize_body(" \t \n ", 1600, &ctx());
        assert!(result.is_empty());
    }

    #[test]
    fn test_control_chars_removed() {
        let result = sanitize_body("un\u{0007}safe\u{0000}", 1600, &ctx());
        assert_eq!(result.text, "unsafe");
        assert_eq!(result.control_chars_removed, 2);
    }

    #[test]
    fn test_keeps_newlines() {
        let result = sanitize_body("line one\nline two", 1600, &ctx());
        assert_eq!(result.text, "line one\nline two");
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let body = "é".repeat(20);
        let result = sanitize_body(&body, 5, &ctx());
        assert_eq!(result.text.chars().count(), 5);
        assert!(result.truncated);
    }
}
