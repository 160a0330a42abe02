//! Channel artifact generation.
//!
//! Artifacts are pure data transformations: `(kind, description, options)` in,
//! a channel-shaped record out. Only the envelope is fixed here; the payload
//! shapes follow the respective platform schemas in their minimal form.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::Channel;

/// Fixed envelope wrapping every generated artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    pub channel: String,
    #[serde(rename = "channelName")]
    pub channel_name: String,
    #[serde(rename = "artifactType")]
    pub artifact_type: String,
    pub description: String,
    pub artifact: Value,
}

/// Build an artifact of `kind` for `channel`. Returns `None` when the channel
/// does not carry that artifact kind.
pub fn generate_artifact(
    channel: &Channel,
    kind: &str,
    description: &str,
    options: &Value,
) -> Option<ArtifactEnvelope> {
    if !channel.supports_artifact(kind) {
        return None;
    }

    let title = options
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_else(|| first_line(description));

    let artifact = match (channel.id.as_str(), kind) {
        ("slack", "blocks") => json!({
            "blocks": [
                {
                    "type": "header",
                    "text": { "type": "plain_text", "text": title }
                },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": description }
                }
            ]
        }),
        ("teams", "adaptive_cards") => json!({
            "type": "AdaptiveCard",
            "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
            "version": "1.5",
            "body": [
                { "type": "TextBlock", "size": "Medium", "weight": "Bolder", "text": title },
                { "type": "TextBlock", "text": description, "wrap": true }
            ]
        }),
        ("discord", "embeds") => json!({
            "embeds": [
                {
                    "title": title,
                    "description": description,
                    "color": 0x5865F2
                }
            ]
        }),
        ("whatsapp", "templates") => json!({
            "name": slugify(title),
            "language": { "code": "en" },
            "components": [
                {
                    "type": "body",
                    "parameters": [ { "type": "text", "text": description } ]
                }
            ]
        }),
        ("apple-business-chat", "rich_links") => json!({
            "richLinkData": {
                "title": title,
                "url": options.get("url").and_then(Value::as_str).unwrap_or(""),
                "assets": {}
            }
        }),
        ("web", "html") => json!({
            "html": format!("<div class=\"bk25-artifact\"><h3>{}</h3><p>{}</p></div>", title, description)
        }),
        ("web", "json") => json!({ "title": title, "description": description }),
        // Remaining kinds share a generic shape; platform-exact catalogs are
        // supplied by the respective integrations, not here.
        _ => json!({
            "kind": kind,
            "title": title,
            "description": description,
            "options": options,
        }),
    };

    Some(ArtifactEnvelope {
        channel: channel.id.clone(),
        channel_name: channel.name.clone(),
        artifact_type: kind.to_string(),
        description: description.to_string(),
        artifact,
    })
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ChannelRegistry;

    #[test]
    fn slack_blocks_envelope() {
        let registry = ChannelRegistry::new();
        let slack = registry.get("slack").unwrap();
        let env = generate_artifact(&slack, "blocks", "Deploy finished", &json!({}))
            .expect("slack supports blocks");

        assert_eq!(env.channel, "slack");
        assert_eq!(env.channel_name, "Slack");
        assert_eq!(env.artifact_type, "blocks");
        assert!(env.artifact["blocks"].is_array());
    }

    #[test]
    fn unsupported_kind_returns_none() {
        let registry = ChannelRegistry::new();
        let slack = registry.get("slack").unwrap();
        assert!(generate_artifact(&slack, "adaptive_cards", "x", &json!({})).is_none());
    }

    #[test]
    fn title_option_overrides_description_line() {
        let registry = ChannelRegistry::new();
        let discord = registry.get("discord").unwrap();
        let env = generate_artifact(
            &discord,
            "embeds",
            "long body text",
            &json!({"title": "Release notes"}),
        )
        .unwrap();
        assert_eq!(env.artifact["embeds"][0]["title"], "Release notes");
    }

    #[test]
    fn whatsapp_template_name_is_slug() {
        let registry = ChannelRegistry::new();
        let whatsapp = registry.get("whatsapp").unwrap();
        let env =
            generate_artifact(&whatsapp, "templates", "Order Shipped Alert!", &json!({})).unwrap();
        assert_eq!(env.artifact["name"], "order_shipped_alert");
    }
}
