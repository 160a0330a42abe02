use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Personality traits shown in UI metadata and persona listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_approach")]
    pub approach: String,
    #[serde(default = "default_philosophy")]
    pub philosophy: String,
    #[serde(default = "default_motto")]
    pub motto: String,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            tone: default_tone(),
            approach: default_approach(),
            philosophy: default_philosophy(),
            motto: default_motto(),
        }
    }
}

fn default_tone() -> String {
    "neutral".to_string()
}
fn default_approach() -> String {
    "helpful".to_string()
}
fn default_philosophy() -> String {
    "assistance".to_string()
}
fn default_motto() -> String {
    "here to help".to_string()
}

/// An LLM-conditioning profile: system prompt plus presentation metadata.
///
/// Personas are immutable once loaded; concurrent readers share them via
/// `Arc`. The on-disk descriptor format matches this struct field-for-field
/// (`systemPrompt` in camelCase); unknown top-level fields are retained in
/// `extra` so a round-trip export preserves them, but nothing reads them at
/// runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub description: String,
    pub greeting: String,
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub personality: Personality,
    /// Channel ids this persona is eligible on. Empty = eligible everywhere.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Set on personas created at runtime rather than loaded from disk.
    #[serde(default, skip_serializing_if = "is_false")]
    pub custom: bool,
    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Persona {
    /// A persona with an empty `channels` set is eligible on every channel.
    pub fn is_eligible_for(&self, channel_id: &str) -> bool {
        self.channels.is_empty() || self.channels.iter().any(|c| c == channel_id)
    }

    /// Required descriptor fields must be present and non-empty.
    pub fn validate(&self) -> Result<(), PersonaError> {
        for (field, value) in [
            ("id", &self.id),
            ("name", &self.name),
            ("description", &self.description),
            ("greeting", &self.greeting),
            ("systemPrompt", &self.system_prompt),
        ] {
            if value.trim().is_empty() {
                return Err(PersonaError::InvalidDescriptor(format!(
                    "required field '{}' is missing or empty",
                    field
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("invalid persona descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("persona id already registered: {0}")]
    DuplicateId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("descriptor parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "id": "vanilla",
            "name": "Vanilla",
            "description": "Plain assistant",
            "greeting": "Hello!",
            "systemPrompt": "You are a plain assistant."
        }"#
    }

    #[test]
    fn descriptor_parses_with_defaults() {
        let p: Persona = serde_json::from_str(minimal_json()).unwrap();
        assert_eq!(p.id, "vanilla");
        assert!(p.capabilities.is_empty());
        assert!(p.channels.is_empty());
        assert_eq!(p.personality.tone, "neutral");
        assert!(p.validate().is_ok());
    }

    #[test]
    fn unknown_fields_are_retained() {
        let json = r##"{
            "id": "x", "name": "X", "description": "d", "greeting": "g",
            "systemPrompt": "s", "theme_color": "#fff"
        }"##;
        let p: Persona = serde_json::from_str(json).unwrap();
        assert!(p.extra.contains_key("theme_color"));

        let exported = serde_json::to_value(&p).unwrap();
        assert_eq!(exported["theme_color"], "#fff");
    }

    #[test]
    fn empty_system_prompt_is_invalid() {
        let json = r#"{
            "id": "x", "name": "X", "description": "d", "greeting": "g",
            "systemPrompt": "   "
        }"#;
        let p: Persona = serde_json::from_str(json).unwrap();
        assert!(p.validate().is_err());
    }

    #[test]
    fn channel_eligibility() {
        let mut p: Persona = serde_json::from_str(minimal_json()).unwrap();
        assert!(p.is_eligible_for("slack"));

        p.channels = vec!["web".to_string(), "teams".to_string()];
        assert!(p.is_eligible_for("web"));
        assert!(!p.is_eligible_for("slack"));
    }
}
