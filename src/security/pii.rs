//! PII masking for log output.
//!
//! Crisis messages routinely contain phone numbers, addresses and emails.
//! Message bodies are logged only after passing through [`scrub_text`], and
//! session identifiers only through [`mask_identifier`].

use lazy_static::lazy_static;
use regex::Regex;

/// Kind of entity a masking rule replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entity {
    Email,
    Phone,
    Address,
}

lazy_static! {
    /// Applied in order; emails go first so their digits never read as phones.
    static ref MASKS: [(Entity, Regex, &'static str); 3] = [
        (
            Entity::Email,
            Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap(),
            "[EMAIL]",
        ),
        (
            // North American numbers, optional country code.
            Entity::Phone,
            Regex::new(r"(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}").unwrap(),
            "[PHONE]",
        ),
        (
            Entity::Address,
            Regex::new(
                r"(?i)\b\d{1,5}\s+(?:[a-z]+\s){1,3}(?:st|street|ave|avenue|rd|road|blvd|dr|drive|lane|ln|way)\b",
            )
            .unwrap(),
            "[ADDRESS]",
        ),
    ];
}

/// Counts of masked entities.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaskCounts {
    pub emails: usize,
    pub phones: usize,
    pub addresses: usize,
}

impl MaskCounts {
    pub fn total(&self) -> usize {
        self.emails + self.phones + self.addresses
    }

    fn slot(&mut self, entity: Entity) -> &mut usize {
        match entity {
            Entity::Email => &mut self.emails,
            Entity::Phone => &mut self.phones,
            Entity::Address => &mut self.addresses,
        }
    }
}

/// Replace contact details and street addresses with placeholder tokens.
pub fn scrub_text(text: &str) -> (String, MaskCounts) {
    let mut counts = MaskCounts::default();
    let mut masked = text.to_string();

    for (entity, pattern, token) in MASKS.iter() {
        let hits = pattern.find_iter(&masked).count();
        if hits == 0 {
            continue;
        }
        *counts.slot(*entity) += hits;
        masked = pattern.replace_all(&masked, *token).into_owned();
    }

    (masked, counts)
}

/// Convenience wrapper returning only the scrubbed text.
pub fn scrub_for_log(text: &str) -> String {
    scrub_text(text).0
}

/// Mask a session identifier, keeping the last four characters.
///
/// # Examples
/// ```
/// use safetynet_core::security::mask_identifier;
/// assert_eq!(mask_identifier("+16475550199"), "***0199");
/// assert_eq!(mask_identifier("abc"), "***");
/// ```
pub fn mask_identifier(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{}", tail)
}
