//! Runtime configuration.
//!
//! Every threshold and simulation constant used by the triage core lives in
//! [`TriageConfig`]. The host process passes it as JSON (the same way it
//! hands over message payloads); `SAFETYNET_*` environment variables
//! override individual fields.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::TriageError;

/// Which reply text the engine produces for each processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    /// Survivor-facing guided script for the current flow state.
    Guided,
    /// Operator-facing analysis block (category, urgency, reasoning, ...).
    Operator,
}

impl ReplyMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "guided" => Some(ReplyMode::Guided),
            "operator" => Some(ReplyMode::Operator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Urgency at or above which a responder is dispatched.
    pub dispatch_threshold: u8,
    /// Urgency that forces the conversation into EMERGENCY.
    pub emergency_override_urgency: u8,
    /// Starting distance for dispatches at the override urgency.
    pub critical_baseline_km: f64,
    /// Starting distance for every other dispatch.
    pub standard_baseline_km: f64,
    /// Distance removed from each live dispatch per tick.
    pub tick_step_km: f64,
    /// ETA label multiplier: `ceil(distance * eta_minutes_per_km)`.
    pub eta_minutes_per_km: f64,
    pub tick_interval_ms: u64,
    /// Upper bound on the advisory AI call.
    pub ai_timeout_ms: u64,
    pub session_idle_timeout_secs: u64,
    /// Number of processed message keys remembered for replay detection.
    pub dedup_capacity: usize,
    pub max_message_chars: usize,
    /// Also send a community responder when police involvement is needed.
    pub dispatch_when_police_needed: bool,
    pub reply_mode: ReplyMode,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            dispatch_threshold: 8,
            emergency_override_urgency: 10,
            critical_baseline_km: 1.5,
            standard_baseline_km: 2.4,
            tick_step_km: 0.15,
            eta_minutes_per_km: 2.5,
            tick_interval_ms: 1_000,
            ai_timeout_ms: 2_500,
            session_idle_timeout_secs: 1_800,
            dedup_capacity: 1_024,
            max_message_chars: 1_600,
            dispatch_when_police_needed: true,
            reply_mode: ReplyMode::Guided,
        }
    }
}

impl TriageConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, TriageError> {
        let config: TriageConfig = serde_json::from_str(json)
            .map_err(|e| TriageError::InvalidConfig(format!("JSON parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config = Self::from_json(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `SAFETYNET_*` environment variable overrides and re-validate.
    pub fn apply_env_overrides(&mut self) -> Result<(), TriageError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), TriageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, raw: String) -> Result<T, TriageError> {
            raw.trim()
                .parse::<T>()
                .map_err(|_| TriageError::InvalidConfig(format!("{}={:?} is not valid", key, raw)))
        }

        if let Some(v) = lookup("SAFETYNET_DISPATCH_THRESHOLD") {
            self.dispatch_threshold = parsed("SAFETYNET_DISPATCH_THRESHOLD", v)?;
        }
        if let Some(v) = lookup("SAFETYNET_TICK_STEP_KM") {
            self.tick_step_km = parsed("SAFETYNET_TICK_STEP_KM", v)?;
        }
        if let Some(v) = lookup("SAFETYNET_TICK_INTERVAL_MS") {
            self.tick_interval_ms = parsed("SAFETYNET_TICK_INTERVAL_MS", v)?;
        }
        if let Some(v) = lookup("SAFETYNET_AI_TIMEOUT_MS") {
            self.ai_timeout_ms = parsed("SAFETYNET_AI_TIMEOUT_MS", v)?;
        }
        if let Some(v) = lookup("SAFETYNET_SESSION_IDLE_TIMEOUT_SECS") {
            self.session_idle_timeout_secs = parsed("SAFETYNET_SESSION_IDLE_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("SAFETYNET_DISPATCH_WHEN_POLICE_NEEDED") {
            self.dispatch_when_police_needed = parsed("SAFETYNET_DISPATCH_WHEN_POLICE_NEEDED", v)?;
        }
        if let Some(v) = lookup("SAFETYNET_REPLY_MODE") {
            self.reply_mode = ReplyMode::parse(&v).ok_or_else(|| {
                TriageError::InvalidConfig(format!("SAFETYNET_REPLY_MODE={:?} is not valid", v))
            })?;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), TriageError> {
        if !(1..=10).contains(&self.dispatch_threshold) {
            return Err(TriageError::InvalidConfig(
                "dispatch_threshold must be within 1..=10".to_string(),
            ));
        }
        if !(1..=10).contains(&self.emergency_override_urgency) {
            return Err(TriageError::InvalidConfig(
                "emergency_override_urgency must be within 1..=10".to_string(),
            ));
        }
        if self.tick_step_km <= 0.0 || !self.tick_step_km.is_finite() {
            return Err(TriageError::InvalidConfig(
                "tick_step_km must be a positive number".to_string(),
            ));
        }
        for (name, value) in [
            ("critical_baseline_km", self.critical_baseline_km),
            ("standard_baseline_km", self.standard_baseline_km),
            ("eta_minutes_per_km", self.eta_minutes_per_km),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(TriageError::InvalidConfig(format!(
                    "{} must be a non-negative number",
                    name
                )));
            }
        }
        if self.tick_interval_ms == 0 {
            return Err(TriageError::InvalidConfig(
                "tick_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.max_message_chars == 0 {
            return Err(TriageError::InvalidConfig(
                "max_message_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Starting distance for a new dispatch at the given urgency.
    pub fn baseline_km(&self, urgency: u8) -> f64 {
        if urgency >= self.emergency_override_urgency {
            self.critical_baseline_km
        } else {
            self.standard_baseline_km
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = TriageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatch_threshold, 8);
        assert_eq!(config.reply_mode, ReplyMode::Guided);
    }

    #[test]
    fn test_from_json_partial() {
        let config = TriageConfig::from_json(r#"{"dispatch_threshold": 7, "reply_mode": "operator"}"#)
            .unwrap();
        assert_eq!(config.dispatch_threshold, 7);
        assert_eq!(config.reply_mode, ReplyMode::Operator);
        assert_eq!(config.tick_step_km, 0.15);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(TriageConfig::from_json(r#"{"dispatch_threshold": 0}"#).is_err());
        assert!(TriageConfig::from_json(r#"{"tick_step_km": -1.0}"#).is_err());
        assert!(TriageConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SAFETYNET_DISPATCH_THRESHOLD", "9"),
            ("SAFETYNET_REPLY_MODE", "OPERATOR"),
            ("SAFETYNET_DISPATCH_WHEN_POLICE_NEEDED", "false"),
        ]);
        let mut config = TriageConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.dispatch_threshold, 9);
        assert_eq!(config.reply_mode, ReplyMode::Operator);
        assert!(!config.dispatch_when_police_needed);
    }

    #[test]
    fn test_env_override_parse_error() {
        let mut config = TriageConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "SAFETYNET_TICK_STEP_KM").then(|| "fast".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_baseline_by_urgency() {
        let config = TriageConfig::default();
        assert_eq!(config.baseline_km(10), 1.5);
        assert_eq!(config.baseline_km(9), 2.4);
        assert_eq!(config.baseline_km(8), 2.4);
        assert!(config.baseline_km(10) < config.baseline_km(8));
    }
}
