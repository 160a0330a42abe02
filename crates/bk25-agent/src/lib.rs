pub mod dispatcher;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use dispatcher::LlmDispatcher;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::{LlmProvider, LlmReply, LlmRequest, ProviderError, TokenUsage};
