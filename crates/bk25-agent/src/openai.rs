use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{LlmProvider, LlmReply, LlmRequest, ProviderError, TokenUsage};

/// Remote completion timeout.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote provider speaking the OpenAI chat-completions shape.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl OpenAiProvider {
    /// `base_url` without the `/v1/chat/completions` suffix and without a
    /// trailing slash (e.g. `https://api.openai.com`).
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, req: &LlmRequest) -> Result<LlmReply, ProviderError> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());

        let mut messages = Vec::with_capacity(3);
        if let Some(system) = &req.system_message {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        if let Some(context) = &req.context {
            messages.push(serde_json::json!({
                "role": "user",
                "content": format!("Context: {}", context),
            }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": req.prompt }));

        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %model, "sending request to OpenAI");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .timeout(GENERATE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Unavailable(e.to_string())
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let content = api_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ProviderError::EmptyContent);
        }

        Ok(LlmReply {
            content,
            model: api_resp.model.unwrap_or(model),
            provider: self.name().to_string(),
            usage: api_resp.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }

    /// Availability is a configured credential, not a network probe.
    async fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

// OpenAI API response types (deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
