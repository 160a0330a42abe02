use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::types::{Channel, ChannelCapability};

/// Fixed in-memory table of the seven delivery surfaces.
///
/// Channels cannot be added or removed at runtime; the only mutable state is
/// the current-channel selection, serialized behind an `RwLock`.
pub struct ChannelRegistry {
    /// Presentation order: web first, then the chat platforms.
    order: Vec<Arc<Channel>>,
    by_id: HashMap<String, Arc<Channel>>,
    current: RwLock<Arc<Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        let order: Vec<Arc<Channel>> = builtin_channels().into_iter().map(Arc::new).collect();
        let by_id: HashMap<String, Arc<Channel>> = order
            .iter()
            .map(|c| (c.id.clone(), Arc::clone(c)))
            .collect();
        let web = by_id.get("web").expect("web channel is built in").clone();
        info!(count = order.len(), "channel registry initialized");
        Self {
            order,
            by_id,
            current: RwLock::new(web),
        }
    }

    pub fn list(&self) -> Vec<Arc<Channel>> {
        self.order.clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Channel>> {
        self.by_id.get(id).cloned()
    }

    pub fn current(&self) -> Arc<Channel> {
        self.current.read().unwrap().clone()
    }

    /// Switch the current channel. Unknown ids are a no-op returning `None`.
    pub fn switch(&self, id: &str) -> Option<Arc<Channel>> {
        match self.by_id.get(id).cloned() {
            Some(channel) => {
                info!(id = %channel.id, "switched channel");
                *self.current.write().unwrap() = channel.clone();
                Some(channel)
            }
            None => {
                warn!(id, "channel not found");
                None
            }
        }
    }

    /// Artifact kinds offered by the current channel.
    pub fn available_artifact_kinds(&self) -> Vec<String> {
        self.current().artifact_kinds.clone()
    }

    /// Supported capability names of the current channel.
    pub fn capabilities(&self) -> Vec<String> {
        self.current().supported_capabilities()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn caps(entries: &[(&str, &str, &str, bool)]) -> BTreeMap<String, ChannelCapability> {
    entries
        .iter()
        .map(|(key, name, desc, supported)| {
            (
                key.to_string(),
                if *supported {
                    ChannelCapability::supported(name, desc)
                } else {
                    ChannelCapability::unsupported(name, desc)
                },
            )
        })
        .collect()
}

fn meta(color: &str, icon: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("color".to_string(), color.to_string()),
        ("icon".to_string(), icon.to_string()),
    ])
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin_channels() -> Vec<Channel> {
    vec![
        Channel {
            id: "web".to_string(),
            name: "Web Interface".to_string(),
            description: "Standard web-based chat interface with HTML/CSS/JS support".to_string(),
            capabilities: caps(&[
                ("rich_text", "Rich Text", "HTML formatting support", true),
                ("file_upload", "File Upload", "File attachment support", true),
                ("real_time", "Real-time Updates", "WebSocket support", true),
                ("custom_ui", "Custom UI", "Custom HTML components", true),
            ]),
            artifact_kinds: strings(&["html", "css", "javascript", "json"]),
            metadata: meta("#007bff", "globe"),
        },
        Channel {
            id: "slack".to_string(),
            name: "Slack".to_string(),
            description: "Slack workspace integration with Block Kit support".to_string(),
            capabilities: caps(&[
                ("blocks", "Block Kit", "Slack Block Kit UI", true),
                ("threads", "Threads", "Threaded conversations", true),
                ("reactions", "Reactions", "Emoji reactions", true),
                ("slash_commands", "Slash Commands", "Slack slash commands", true),
            ]),
            artifact_kinds: strings(&["blocks", "attachments", "modals"]),
            metadata: meta("#4A154B", "chat"),
        },
        Channel {
            id: "teams".to_string(),
            name: "Microsoft Teams".to_string(),
            description: "Teams integration with Adaptive Cards and bot framework".to_string(),
            capabilities: caps(&[
                ("adaptive_cards", "Adaptive Cards", "Teams Adaptive Cards", true),
                ("task_modules", "Task Modules", "Teams task modules", true),
                ("bot_framework", "Bot Framework", "Microsoft Bot Framework", true),
                ("tabs", "Tabs", "Teams tabs integration", true),
            ]),
            artifact_kinds: strings(&["adaptive_cards", "task_modules", "bot_activities"]),
            metadata: meta("#6264A7", "office"),
        },
        Channel {
            id: "discord".to_string(),
            name: "Discord".to_string(),
            description: "Discord bot integration with embeds and slash commands".to_string(),
            capabilities: caps(&[
                ("embeds", "Embeds", "Discord rich embeds", true),
                ("slash_commands", "Slash Commands", "Discord slash commands", true),
                ("reactions", "Reactions", "Emoji reactions", true),
                ("voice", "Voice", "Voice channel support", false),
            ]),
            artifact_kinds: strings(&["embeds", "slash_commands", "components"]),
            metadata: meta("#5865F2", "game"),
        },
        Channel {
            id: "twitch".to_string(),
            name: "Twitch".to_string(),
            description: "Twitch chat integration with streamer tools".to_string(),
            capabilities: caps(&[
                ("chat_commands", "Chat Commands", "Twitch chat commands", true),
                ("extensions", "Extensions", "Twitch extensions", false),
                ("moderation", "Moderation", "Chat moderation tools", false),
                ("alerts", "Alerts", "Stream alerts", false),
            ]),
            artifact_kinds: strings(&["chat_commands", "extensions"]),
            metadata: meta("#9146FF", "stream"),
        },
        Channel {
            id: "whatsapp".to_string(),
            name: "WhatsApp".to_string(),
            description: "WhatsApp Business API integration".to_string(),
            capabilities: caps(&[
                ("media", "Media", "Image/video support", true),
                ("templates", "Templates", "Message templates", true),
                ("quick_replies", "Quick Replies", "Quick reply buttons", true),
                ("location", "Location", "Location sharing", false),
            ]),
            artifact_kinds: strings(&["templates", "media", "interactive"]),
            metadata: meta("#25D366", "mobile"),
        },
        Channel {
            id: "apple-business-chat".to_string(),
            name: "Apple Business Chat".to_string(),
            description: "Apple Business Chat integration for iOS users".to_string(),
            capabilities: caps(&[
                ("rich_links", "Rich Links", "Rich link previews", true),
                ("payments", "Payments", "Apple Pay integration", false),
                ("scheduling", "Scheduling", "Calendar scheduling", false),
                ("file_sharing", "File Sharing", "File sharing support", true),
            ]),
            artifact_kinds: strings(&["rich_links", "interactive_messages", "payments"]),
            metadata: meta("#000000", "apple"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_channels_web_first() {
        let registry = ChannelRegistry::new();
        let channels = registry.list();
        assert_eq!(channels.len(), 7);
        assert_eq!(channels[0].id, "web");

        let ids: Vec<&str> = channels.iter().map(|c| c.id.as_str()).collect();
        for id in [
            "web",
            "slack",
            "teams",
            "discord",
            "twitch",
            "whatsapp",
            "apple-business-chat",
        ] {
            assert!(ids.contains(&id), "missing channel {id}");
        }
    }

    #[test]
    fn default_current_is_web() {
        let registry = ChannelRegistry::new();
        assert_eq!(registry.current().id, "web");
    }

    #[test]
    fn switch_known_and_unknown() {
        let registry = ChannelRegistry::new();
        let slack = registry.switch("slack").expect("slack exists");
        assert_eq!(slack.id, "slack");
        assert_eq!(registry.current().id, "slack");

        assert!(registry.switch("irc").is_none());
        assert_eq!(registry.current().id, "slack");
    }

    #[test]
    fn artifact_kinds_follow_current_channel() {
        let registry = ChannelRegistry::new();
        registry.switch("teams");
        let kinds = registry.available_artifact_kinds();
        assert!(kinds.contains(&"adaptive_cards".to_string()));
    }

    #[test]
    fn unsupported_capabilities_are_excluded() {
        let registry = ChannelRegistry::new();
        registry.switch("discord");
        let capabilities = registry.capabilities();
        assert!(capabilities.contains(&"embeds".to_string()));
        assert!(!capabilities.contains(&"voice".to_string()));
    }
}
