use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bk25_channels::Channel;

use crate::extract::ExtractedCode;

/// Inbound chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_conversation_id")]
    pub conversation_id: String,
    #[serde(default)]
    pub persona_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Extra context prepended to the conversation context.
    #[serde(default)]
    pub context: Option<String>,
}

fn default_conversation_id() -> String {
    "default".to_string()
}

/// Compact persona descriptor attached to chat responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaInfo {
    pub id: String,
    pub name: String,
    pub greeting: String,
}

/// Compact channel descriptor attached to chat responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

/// Chat response: visible text plus the optional extracted code block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub response: String,
    pub persona: PersonaInfo,
    pub channel: ChannelInfo,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_code: Option<ExtractedCode>,
}

/// Channel switch result: the channel plus what it can carry.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelView {
    pub channel: Channel,
    pub artifact_kinds: Vec<String>,
    pub capabilities: Vec<String>,
}

/// Facade-level system snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub providers: BTreeMap<String, bool>,
    pub personas_loaded: usize,
    pub channels_available: usize,
    pub conversations_active: usize,
    pub current_persona: Option<String>,
    pub current_channel: String,
}
