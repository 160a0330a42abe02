use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single platform feature a channel may or may not support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCapability {
    pub name: String,
    pub description: String,
    pub supported: bool,
}

impl ChannelCapability {
    pub fn supported(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            supported: true,
        }
    }

    pub fn unsupported(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            supported: false,
        }
    }
}

/// A conceptual delivery surface. Not a transport: the channel only constrains
/// which artifact shapes and capabilities are permissible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Keyed by capability id (e.g. "blocks", "threads").
    pub capabilities: BTreeMap<String, ChannelCapability>,
    /// Artifact shapes this channel can carry (e.g. "blocks", "embeds").
    pub artifact_kinds: Vec<String>,
    /// Opaque display metadata (color, icon).
    pub metadata: BTreeMap<String, String>,
}

impl Channel {
    pub fn supports_artifact(&self, kind: &str) -> bool {
        self.artifact_kinds.iter().any(|k| k == kind)
    }

    pub fn supports_capability(&self, name: &str) -> bool {
        self.capabilities
            .get(name)
            .map(|c| c.supported)
            .unwrap_or(false)
    }

    /// Names of the capabilities this channel actually supports.
    pub fn supported_capabilities(&self) -> Vec<String> {
        self.capabilities
            .iter()
            .filter(|(_, c)| c.supported)
            .map(|(k, _)| k.clone())
            .collect()
    }
}
