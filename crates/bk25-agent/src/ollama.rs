use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{LlmProvider, LlmReply, LlmRequest, ProviderError, TokenUsage};

/// Completion timeout for local generation. Local models can be slow to load.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);
/// Availability probe timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Local provider speaking the Ollama REST shape.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            default_model: default_model.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, req: &LlmRequest) -> Result<LlmReply, ProviderError> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());

        let mut options = serde_json::json!({
            "temperature": req.temperature,
            "num_predict": req.max_tokens,
        });
        // Caller-supplied options override the defaults key-by-key.
        if let Some(serde_json::Value::Object(extra)) = &req.options {
            let map = options.as_object_mut().unwrap();
            for (k, v) in extra {
                map.insert(k.clone(), v.clone());
            }
        }

        let body = serde_json::json!({
            "model": model,
            "prompt": build_prompt(req),
            "stream": false,
            "options": options,
        });

        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %model, "sending request to Ollama");

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .timeout(GENERATE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                // Surface connection/timeout errors as Unavailable so the
                // dispatcher can fall through to the next provider.
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Unavailable(e.to_string())
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Ollama API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if api_resp.response.is_empty() {
            return Err(ProviderError::EmptyContent);
        }

        Ok(LlmReply {
            content: api_resp.response,
            model: api_resp.model.unwrap_or(model),
            provider: self.name().to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: api_resp.prompt_eval_count.unwrap_or(0),
                completion_tokens: api_resp.eval_count.unwrap_or(0),
            }),
        })
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Ollama's `/api/generate` takes a single prompt string; system message and
/// context are folded in as labelled sections with a trailing assistant cue.
fn build_prompt(req: &LlmRequest) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(system) = &req.system_message {
        parts.push(format!("System: {}", system));
    }
    if let Some(context) = &req.context {
        parts.push(format!("Context: {}", context));
    }
    parts.push(format!("User: {}", req.prompt));
    parts.push("Assistant: ".to_string());
    parts.join("\n\n")
}

// Ollama API response types (deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    model: Option<String>,
    #[serde(default)]
    response: String,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_all_sections_in_order() {
        let req = LlmRequest::new("list files")
            .with_system("You are a shell expert.")
            .with_context("Conversation so far");
        let prompt = build_prompt(&req);

        let system_pos = prompt.find("System:").unwrap();
        let context_pos = prompt.find("Context:").unwrap();
        let user_pos = prompt.find("User:").unwrap();
        assert!(system_pos < context_pos && context_pos < user_pos);
        assert!(prompt.ends_with("Assistant: "));
    }

    #[test]
    fn prompt_without_system_or_context() {
        let prompt = build_prompt(&LlmRequest::new("hi"));
        assert_eq!(prompt, "User: hi\n\nAssistant: ");
    }
}
