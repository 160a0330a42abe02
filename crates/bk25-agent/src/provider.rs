use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The user-facing prompt text.
    pub prompt: String,
    /// Model override; providers fall back to their configured default.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Instruction text injected ahead of the prompt.
    pub system_message: Option<String>,
    /// Conversation or task context injected between system and prompt.
    pub context: Option<String>,
    /// Extra provider-specific generation options, merged verbatim into the
    /// provider's option map.
    pub options: Option<serde_json::Value>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            temperature: 0.7,
            max_tokens: 2048,
            system_message: None,
            context: None,
            options: None,
        }
    }

    pub fn with_system(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Token accounting reported by the provider, when available.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Successful provider response.
#[derive(Debug, Clone)]
pub struct LlmReply {
    pub content: String,
    pub model: String,
    pub provider: String,
    pub usage: Option<TokenUsage>,
}

/// Common interface for all LLM providers (Ollama, OpenAI-compatible, …).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging, selection, and response metadata.
    fn name(&self) -> &str;

    /// Send a generation request and wait for the full response.
    async fn generate(&self, req: &LlmRequest) -> Result<LlmReply, ProviderError>;

    /// Cheap availability check: a reachable endpoint or a configured key.
    async fn is_available(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider returned empty content")]
    EmptyContent,
}
