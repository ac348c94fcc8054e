//! Advisory AI augmentation.
//!
//! An external inference service may refine the keyword classification. It
//! is never trusted exclusively:
//! - The keyword result is computed first and is always available.
//! - The external call runs on a worker thread bounded by a timeout.
//! - Timeouts, transport errors and malformed payloads all fall back to the
//!   keyword result (logged, never surfaced to the reporting party).
//! - A well-formed answer may replace the category and raise (never lower)
//!   urgency; it can add a police escalation but never remove one.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::classification::category::{Category, Emotion};
use crate::classification::classifier::{classify, Classification, ClassificationSource};
use crate::classification::escalation;
use crate::logging::structured::LogContext;

lazy_static! {
    /// First `{ ... }` block in free model text (greedy to the last brace).
    static ref JSON_OBJECT_PATTERN: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AugmentError {
    #[error("augmentation timed out after {0:?}")]
    Timeout(Duration),

    #[error("augmentation transport failed: {0}")]
    Transport(String),

    #[error("augmentation returned malformed output: {0}")]
    Malformed(String),
}

/// External inference collaborator.
///
/// Implementations return the raw model text; parsing and validation happen
/// here so every implementation gets the same fallback behavior.
pub trait Augmenter: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(&self, text: &str) -> Result<String, AugmentError>;
}

/// Fields recovered from a model answer. Each one is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiAnalysis {
    pub category: Option<Category>,
    pub urgency: Option<u8>,
    pub emotion: Option<Emotion>,
    pub police_needed: Option<bool>,
    /// The model's own action label. Advisory only: the action applied is
    /// always re-derived from urgency.
    pub recommended_action: Option<String>,
    pub suggested_response: Option<String>,
}

impl AiAnalysis {
    fn is_usable(&self) -> bool {
        self.category.is_some() || self.urgency.is_some()
    }
}

/// Extract and validate the JSON object embedded in model output.
///
/// Accepts camelCase and snake_case keys. Fields with the wrong type or out
/// of range are dropped individually; the payload is malformed only when no
/// JSON object is present or neither category nor urgency survives.
pub fn parse_ai_payload(raw: &str) -> Result<AiAnalysis, AugmentError> {
    let json = JSON_OBJECT_PATTERN
        .find(raw)
        .ok_or_else(|| AugmentError::Malformed("no JSON object in output".to_string()))?;

    let value: Value = serde_json::from_str(json.as_str())
        .map_err(|e| AugmentError::Malformed(format!("JSON parse error: {}", e)))?;

    if !value.is_object() {
        return Err(AugmentError::Malformed("payload is not an object".to_string()));
    }

    let analysis = AiAnalysis {
        category: first_str(&value, &["category"]).and_then(Category::parse),
        urgency: first_value(&value, &["urgency", "urgencyScore", "urgency_score"])
            .and_then(value_to_int)
            .filter(|u| (1..=10).contains(u))
            .map(|u| u as u8),
        emotion: first_str(&value, &["emotion", "sentiment"]).and_then(Emotion::parse),
        police_needed: first_value(&value, &["policeNeeded", "police_needed"])
            .and_then(value_to_bool),
        recommended_action: recommended_action(&value),
        suggested_response: first_str(&value, &["suggestedResponse", "suggested_response"])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };

    if !analysis.is_usable() {
        return Err(AugmentError::Malformed(
            "neither a known category nor a valid urgency".to_string(),
        ));
    }

    Ok(analysis)
}

/// Merge an external answer into the keyword classification.
pub fn merge(base: Classification, ai: &AiAnalysis) -> Classification {
    let mut merged = match ai.category {
        Some(category) if category != base.category => {
            let mut replaced = Classification::from_category(category, None);
            replaced.key_indicators.push(format!("keyword triage: {}", base.category));
            // The keyword escalation survives a category change.
            replaced.police_needed |= base.police_needed;
            replaced.urgency_score = replaced.urgency_score.max(base.urgency_score);
            replaced
        }
        _ => base,
    };

    if let Some(urgency) = ai.urgency {
        merged.urgency_score = merged.urgency_score.max(urgency);
    }
    if let Some(emotion) = ai.emotion {
        merged.emotion = emotion;
    }
    if ai.police_needed == Some(true) {
        escalation::escalate_to_police(&mut merged, "ai: police requested");
    }
    merged.suggested_response = ai.suggested_response.clone();
    merged.source = ClassificationSource::Augmented;
    merged.key_indicators.push("ai augmentation".to_string());

    escalation::enforce(&mut merged);
    merged
}

/// Classify with the optional augmenter, falling back to keywords.
pub fn classify_with_augmenter(
    text: &str,
    augmenter: Option<&Arc<dyn Augmenter>>,
    timeout: Duration,
    ctx: &LogContext,
) -> Classification {
    // Computed before the external call so the fallback never waits on it.
    let base = classify(text);

    let Some(augmenter) = augmenter else {
        return base;
    };

    let started = Instant::now();
    let outcome = run_with_timeout(Arc::clone(augmenter), text.to_string(), timeout)
        .and_then(|raw| parse_ai_payload(&raw));

    match outcome {
        Ok(ai) => {
            let merged = merge(base, &ai);
            log::info!(
                "{} AI_AUGMENT_OK augmenter={} latency_ms={} category={} urgency={} ai_action={}",
                ctx,
                augmenter.name(),
                started.elapsed().as_millis(),
                merged.category,
                merged.urgency_score,
                ai.recommended_action.as_deref().unwrap_or("none")
            );
            merged
        }
        Err(e) => {
            log::warn!(
                "{} AI_FALLBACK augmenter={} latency_ms={} reason={}",
                ctx,
                augmenter.name(),
                started.elapsed().as_millis(),
                e
            );
            base
        }
    }
}

fn run_with_timeout(
    augmenter: Arc<dyn Augmenter>,
    text: String,
    timeout: Duration,
) -> Result<String, AugmentError> {
    let (tx, rx) = mpsc::channel();

    std::thread::Builder::new()
        .name("ai-augment".to_string())
        .spawn(move || {
            // Receiver may be gone after a timeout.
            let _ = tx.send(augmenter.analyze(&text));
        })
        .map_err(|e| AugmentError::Transport(format!("spawn failed: {}", e)))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(AugmentError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(AugmentError::Transport("augmenter worker exited".to_string()))
        }
    }
}

/// Resolve a dot-notation path like `candidates.0.outputText`.
pub fn resolve_json_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }

    let mut current = data;
    for part in path.split('.') {
        match current {
            Value::Object(obj) => current = obj.get(part)?,
            Value::Array(arr) => current = arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        }
    }
    Some(current)
}

fn first_value<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| value.get(*k)).filter(|v| !v.is_null())
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    first_value(value, keys).and_then(|v| v.as_str())
}

/// `recommendedAction` / `recommended_action` as a label, else the older
/// boolean `recommend_dispatch` mapped onto one.
fn recommended_action(value: &Value) -> Option<String> {
    if let Some(label) = first_str(value, &["recommendedAction", "recommended_action"]) {
        let label = label.trim().to_lowercase();
        return (!label.is_empty()).then_some(label);
    }
    first_value(value, &["recommend_dispatch", "recommendDispatch"])
        .and_then(value_to_bool)
        .map(|dispatch| if dispatch { "dispatch" } else { "no_dispatch" }.to_string())
}

fn value_to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}
