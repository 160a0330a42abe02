use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use bk25_core::config::LlmConfig;

use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{LlmProvider, LlmReply, LlmRequest, ProviderError};

/// Routes generation requests across the configured providers.
///
/// Selection policy: the preferred provider is used when it is currently
/// available; otherwise providers are tried in configuration order, skipping
/// unavailable ones. A provider that fails mid-generation is logged and the
/// next one is tried. With no provider left the caller gets an explicit
/// "no providers available" error — the code generator treats that as its cue
/// to fall back to templates.
pub struct LlmDispatcher {
    providers: Vec<Arc<dyn LlmProvider>>,
    preferred: Option<String>,
}

impl LlmDispatcher {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, preferred: Option<String>) -> Self {
        Self {
            providers,
            preferred,
        }
    }

    /// Build the provider set from config. Configuration order is the
    /// fallback order: local Ollama first, then the remote provider.
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

        if let Some(ollama) = &config.ollama {
            providers.push(Arc::new(OllamaProvider::new(
                ollama.base_url.clone(),
                ollama.model.clone(),
            )));
        }
        if let Some(openai) = &config.openai {
            providers.push(Arc::new(OpenAiProvider::new(
                openai.api_key.clone(),
                openai.base_url.clone(),
                openai.model.clone(),
            )));
        }

        info!(
            count = providers.len(),
            preferred = config.preferred_provider.as_deref(),
            "LLM dispatcher initialized"
        );
        Self::new(providers, config.preferred_provider.clone())
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Availability of every configured provider.
    pub async fn probe(&self) -> BTreeMap<String, bool> {
        let mut out = BTreeMap::new();
        for provider in &self.providers {
            out.insert(provider.name().to_string(), provider.is_available().await);
        }
        out
    }

    pub async fn generate(&self, req: &LlmRequest) -> Result<LlmReply, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        // Preferred provider wins when it is currently available.
        if let Some(preferred) = &self.preferred {
            if let Some(provider) = self.providers.iter().find(|p| p.name() == preferred) {
                if provider.is_available().await {
                    match provider.generate(req).await {
                        Ok(reply) => return Ok(reply),
                        Err(e) => {
                            warn!(provider = %preferred, err = %e, "preferred provider failed");
                            last_err = Some(e);
                        }
                    }
                }
            }
        }

        for provider in &self.providers {
            if Some(provider.name()) == self.preferred.as_deref() {
                continue; // already tried above
            }
            if !provider.is_available().await {
                continue;
            }
            match provider.generate(req).await {
                Ok(reply) => {
                    info!(provider = %provider.name(), model = %reply.model, "generation succeeded");
                    return Ok(reply);
                }
                Err(e) => {
                    warn!(provider = %provider.name(), err = %e, "provider generation failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ProviderError::Unavailable("no providers available".to_string())))
    }
}
