//! Generative-language HTTP augmenter (feature `gemini`).
//!
//! Posts a constrained JSON-only prompt and returns the model's raw output
//! text. Parsing and fallback are handled by the augmentation module.

use std::time::Duration;

use anyhow::Context;
use serde_json::{json, Value};

use crate::classification::augmentation::{resolve_json_path, AugmentError, Augmenter};

pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1/models/text-bison-001:generateText";

/// Blocking client for the generateText endpoint.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    /// The HTTP timeout is set a little above the augmentation timeout so the
    /// worker thread does not linger long after the caller gave up.
    pub fn new(api_key: &str, endpoint: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout + Duration::from_millis(500))
            .build()
            .context("building augmentation HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Read `GEMINI_API_KEY` from the environment.
    pub fn from_env(timeout: Duration) -> anyhow::Result<Self> {
        let key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;
        let endpoint = std::env::var("GEMINI_ENDPOINT").ok();
        Self::new(&key, endpoint.as_deref(), timeout)
    }

    fn prompt(message: &str) -> String {
        format!(
            "You are assisting a community safety system.\n\
             Return ONLY a JSON object. No explanation text.\n\n\
             Schema:\n\
             {{\n\
               \"category\": \"following | harassment | unsafe_location | emergency | other\",\n\
               \"urgency\": number (1-10),\n\
               \"emotion\": \"fear | panic | concern | calm\",\n\
               \"recommend_dispatch\": boolean,\n\
               \"police_needed\": boolean,\n\
               \"suggested_response\": string\n\
             }}\n\n\
             Message:\n\"{}\"",
            message.replace('"', "'")
        )
    }
}

impl Augmenter for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze(&self, text: &str) -> Result<String, AugmentError> {
        let body = json!({
            "prompt": { "text": Self::prompt(text) },
            "temperature": 0.2,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AugmentError::Transport("HTTP timeout".to_string())
                } else {
                    AugmentError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AugmentError::Transport(format!("HTTP {}", status)));
        }

        let data: Value = response
            .json()
            .map_err(|e| AugmentError::Malformed(format!("response body: {}", e)))?;

        resolve_json_path(&data, "candidates.0.outputText")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| AugmentError::Malformed("no outputText from model".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_escapes_quotes() {
        let prompt = GeminiClient::prompt(r#"he said "stop""#);
        assert!(prompt.contains("he said 'stop'"));
        assert!(prompt.contains("\"urgency\": number (1-10)"));
    }
}
