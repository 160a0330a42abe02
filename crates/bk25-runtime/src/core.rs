//! The BK25 core facade.
//!
//! Composes the persona and channel registries, the conversation store, the
//! LLM dispatcher, the code generator, and the execution supervisor behind
//! the coarse operations a transport adapter consumes. No globals: construct
//! with a config, `start()`, use, `shutdown()`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use bk25_agent::provider::LlmRequest;
use bk25_agent::LlmDispatcher;
use bk25_channels::{generate_artifact, ArtifactEnvelope, Channel, ChannelRegistry};
use bk25_codegen::prompt::{HistoryMessage, PromptContext};
use bk25_codegen::types::{
    GenerationRequest, GenerationResult, PlatformInfo, ScriptReview, Suggestion,
};
use bk25_codegen::CodeGenerator;
use bk25_core::config::Bk25Config;
use bk25_core::error::{Bk25Error, Result};
use bk25_core::types::Platform;
use bk25_executor::types::{
    ExecutionRequest, ExecutionResult, ExecutionStatistics, ExecutionTask, HistoryFilters,
    TaskDescriptor, TaskMetrics,
};
use bk25_executor::ExecutionSupervisor;
use bk25_memory::{ConversationStore, MemoryStats, Role};
use bk25_personas::{Persona, PersonaError, PersonaRegistry};

use crate::extract::extract_first_code_block;
use crate::types::{ChannelInfo, ChannelView, ChatOutcome, ChatRequest, PersonaInfo, SystemStatus};

pub struct Bk25Core {
    config: Bk25Config,
    personas: PersonaRegistry,
    channels: ChannelRegistry,
    memory: ConversationStore,
    dispatcher: Arc<LlmDispatcher>,
    generator: Arc<CodeGenerator>,
    supervisor: Arc<ExecutionSupervisor>,
}

impl Bk25Core {
    pub fn new(config: Bk25Config) -> Arc<Self> {
        let dispatcher = Arc::new(LlmDispatcher::from_config(&config.llm));
        let generator = Arc::new(CodeGenerator::new(Arc::clone(&dispatcher)));
        let supervisor = ExecutionSupervisor::new(config.executor.clone());
        let memory = ConversationStore::new(
            config.memory.max_conversations,
            config.memory.max_messages_per_conversation,
        );
        let personas = PersonaRegistry::new(&config.personas.path);
        let channels = ChannelRegistry::new();

        Arc::new(Self {
            config,
            personas,
            channels,
            memory,
            dispatcher,
            generator,
            supervisor,
        })
    }

    /// Load personas, probe providers, and start the supervisor loops.
    pub async fn start(self: &Arc<Self>) {
        let loaded = self.personas.load_all();
        let providers = self.dispatcher.probe().await;
        if providers.values().any(|up| *up) {
            info!(?providers, "LLM providers probed");
        } else {
            warn!("no LLM provider available, generation will use templates");
        }
        self.supervisor.start();
        info!(personas = loaded, "BK25 core started");
    }

    pub fn shutdown(&self) {
        self.supervisor.shutdown();
        info!("BK25 core stopped");
    }

    pub fn config(&self) -> &Bk25Config {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Personas
    // -----------------------------------------------------------------------

    pub fn list_personas(&self, channel: Option<&str>) -> Vec<Arc<Persona>> {
        match channel {
            Some(channel_id) => self.personas.list_for_channel(channel_id),
            None => self.personas.list(),
        }
    }

    pub fn current_persona(&self) -> Option<Arc<Persona>> {
        self.personas.current()
    }

    pub fn get_persona(&self, id: &str) -> Option<Arc<Persona>> {
        self.personas.get(id)
    }

    pub fn switch_persona(&self, id: &str) -> Result<Arc<Persona>> {
        self.personas.switch(id).ok_or(Bk25Error::NotFound {
            kind: "persona",
            id: id.to_string(),
        })
    }

    /// Register a runtime-created persona from an untyped descriptor record.
    pub fn create_persona(&self, descriptor: Value) -> Result<Arc<Persona>> {
        let persona: Persona = serde_json::from_value(descriptor)
            .map_err(|e| Bk25Error::InvalidInput(format!("invalid persona descriptor: {}", e)))?;
        self.personas.add_custom(persona).map_err(|e| match e {
            PersonaError::DuplicateId(id) => {
                Bk25Error::InvalidInput(format!("persona id already exists: {}", id))
            }
            other => Bk25Error::InvalidInput(other.to_string()),
        })
    }

    pub fn reload_personas(&self) -> usize {
        self.personas.reload()
    }

    // -----------------------------------------------------------------------
    // Channels
    // -----------------------------------------------------------------------

    pub fn list_channels(&self) -> Vec<Arc<Channel>> {
        self.channels.list()
    }

    pub fn current_channel(&self) -> Arc<Channel> {
        self.channels.current()
    }

    pub fn switch_channel(&self, id: &str) -> Result<ChannelView> {
        let channel = self.channels.switch(id).ok_or(Bk25Error::NotFound {
            kind: "channel",
            id: id.to_string(),
        })?;
        Ok(ChannelView {
            artifact_kinds: channel.artifact_kinds.clone(),
            capabilities: channel.supported_capabilities(),
            channel: (*channel).clone(),
        })
    }

    pub fn channel_artifact(
        &self,
        channel_id: &str,
        kind: &str,
        description: &str,
        options: &Value,
    ) -> Result<ArtifactEnvelope> {
        let channel = self.channels.get(channel_id).ok_or(Bk25Error::NotFound {
            kind: "channel",
            id: channel_id.to_string(),
        })?;
        generate_artifact(&channel, kind, description, options).ok_or_else(|| {
            Bk25Error::InvalidInput(format!(
                "channel {} does not support artifact kind {}",
                channel_id, kind
            ))
        })
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    /// Process a chat message: persona/channel selection, conversation
    /// bookkeeping, LLM generation, and code extraction.
    ///
    /// Unknown persona/channel ids in the request are tolerated (the current
    /// selection stays); a dispatcher failure surfaces as `llm_unavailable`.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome> {
        if request.message.trim().is_empty() {
            return Err(Bk25Error::InvalidInput("message is required".to_string()));
        }

        if let Some(persona_id) = &request.persona_id {
            if self.personas.switch(persona_id).is_none() {
                warn!(persona_id, "chat requested unknown persona, keeping current");
            }
        }
        if let Some(channel_id) = &request.channel_id {
            if self.channels.switch(channel_id).is_none() {
                warn!(channel_id, "chat requested unknown channel, keeping current");
            }
        }

        let persona = self.personas.current();
        let channel = self.channels.current();
        let persona_id = persona
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| "fallback".to_string());
        self.memory
            .create(&request.conversation_id, &persona_id, &channel.id);

        // Conversation context plus any caller-supplied context.
        let mut context = self.memory.context(&request.conversation_id, None);
        if let Some(extra) = &request.context {
            if !extra.is_empty() {
                context = format!("{}\n{}", extra, context);
            }
        }

        let prompt = self.personas.build_prompt(&request.message, &[]);
        let mut llm_request = LlmRequest::new(prompt)
            .with_temperature(self.config.llm.temperature)
            .with_max_tokens(self.config.llm.max_tokens);
        if !context.is_empty() {
            llm_request = llm_request.with_context(context);
        }

        let reply = self
            .dispatcher
            .generate(&llm_request)
            .await
            .map_err(|e| Bk25Error::LlmUnavailable(e.to_string()))?;

        self.memory.append(
            &request.conversation_id,
            Role::User,
            &request.message,
            Value::Null,
        );
        self.memory.append(
            &request.conversation_id,
            Role::Assistant,
            &reply.content,
            Value::Null,
        );

        let (extracted_code, response) = match extract_first_code_block(&reply.content) {
            Some((code, visible)) => (Some(code), visible),
            None => (None, reply.content.clone()),
        };

        let timestamp = self
            .memory
            .get(&request.conversation_id)
            .map(|c| c.updated_at)
            .unwrap_or_else(chrono::Utc::now);

        Ok(ChatOutcome {
            response,
            persona: persona
                .map(|p| PersonaInfo {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    greeting: p.greeting.clone(),
                })
                .unwrap_or_else(|| PersonaInfo {
                    id: persona_id,
                    name: "BK25 Assistant".to_string(),
                    greeting: self.personas.greeting(),
                }),
            channel: ChannelInfo {
                id: channel.id.clone(),
                name: channel.name.clone(),
            },
            conversation_id: request.conversation_id,
            timestamp,
            extracted_code,
        })
    }

    // -----------------------------------------------------------------------
    // Script generation
    // -----------------------------------------------------------------------

    pub async fn generate_script(&self, request: GenerationRequest) -> GenerationResult {
        let context = self.prompt_context(
            request.persona_id.as_deref(),
            request.channel_id.as_deref(),
            None,
        );
        self.generator.generate(&request, Some(&context)).await
    }

    pub async fn improve_script(
        &self,
        script: &str,
        feedback: &str,
        platform: Platform,
    ) -> GenerationResult {
        let context = self.prompt_context(None, None, None);
        self.generator
            .improve_script(script, feedback, platform, Some(&context))
            .await
    }

    pub async fn review_script(&self, script: &str, platform: Platform) -> ScriptReview {
        let context = self.prompt_context(None, None, None);
        self.generator
            .review_script(script, platform, Some(&context))
            .await
    }

    pub fn suggestions(&self, description: &str) -> Vec<Suggestion> {
        self.generator.suggestions(description)
    }

    pub fn platforms(&self) -> Vec<PlatformInfo> {
        Platform::ALL
            .iter()
            .map(|p| self.generator.platform_info(*p))
            .collect()
    }

    /// Prompt context assembled from the addressed (or current) persona and
    /// channel plus recent conversation history.
    fn prompt_context(
        &self,
        persona_id: Option<&str>,
        channel_id: Option<&str>,
        conversation_id: Option<&str>,
    ) -> PromptContext {
        let persona = persona_id
            .and_then(|id| self.personas.get(id))
            .or_else(|| self.personas.current());
        let channel = channel_id
            .and_then(|id| self.channels.get(id))
            .unwrap_or_else(|| self.channels.current());

        let conversation_history = conversation_id
            .map(|id| {
                self.memory
                    .history(id, Some(10))
                    .into_iter()
                    .map(|m| HistoryMessage {
                        role: m.role.as_str().to_string(),
                        content: m.content,
                    })
                    .collect()
            })
            .unwrap_or_default();

        match persona {
            Some(p) => PromptContext {
                persona_id: p.id.clone(),
                persona_name: p.name.clone(),
                persona_description: p.description.clone(),
                persona_capabilities: p.capabilities.clone(),
                channel_id: channel.id.clone(),
                channel_name: channel.name.clone(),
                conversation_history,
            },
            None => PromptContext {
                channel_id: channel.id.clone(),
                channel_name: channel.name.clone(),
                conversation_history,
                ..PromptContext::default()
            },
        }
    }

    // -----------------------------------------------------------------------
    // LLM status
    // -----------------------------------------------------------------------

    pub async fn llm_status(&self) -> BTreeMap<String, bool> {
        self.dispatcher.probe().await
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        self.supervisor.execute_direct(&request).await
    }

    pub fn submit_task(&self, descriptor: TaskDescriptor) -> Result<String> {
        self.supervisor.submit(descriptor)
    }

    pub fn task_status(&self, task_id: &str) -> Result<ExecutionTask> {
        self.supervisor.status(task_id).ok_or(Bk25Error::NotFound {
            kind: "task",
            id: task_id.to_string(),
        })
    }

    pub fn task_metrics(&self, task_id: &str) -> Result<TaskMetrics> {
        self.supervisor
            .metrics(task_id)
            .ok_or(Bk25Error::NotFound {
                kind: "task",
                id: task_id.to_string(),
            })
    }

    pub fn cancel_task(&self, task_id: &str) -> bool {
        self.supervisor.cancel(task_id)
    }

    pub fn pause_task(&self, task_id: &str) -> bool {
        self.supervisor.pause(task_id)
    }

    pub fn resume_task(&self, task_id: &str) -> bool {
        self.supervisor.resume(task_id)
    }

    pub fn running_tasks(&self) -> Vec<ExecutionTask> {
        self.supervisor.running()
    }

    pub fn task_history(&self, limit: usize, filters: &HistoryFilters) -> Vec<ExecutionTask> {
        self.supervisor.history(limit, filters)
    }

    pub fn statistics(&self) -> ExecutionStatistics {
        self.supervisor.statistics()
    }

    // -----------------------------------------------------------------------
    // Conversations & status
    // -----------------------------------------------------------------------

    pub fn conversation_history(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Vec<bk25_memory::ConversationMessage> {
        self.memory.history(conversation_id, limit)
    }

    pub fn conversations(&self) -> Vec<bk25_memory::ConversationSummary> {
        self.memory.summaries()
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    pub async fn system_status(&self) -> SystemStatus {
        SystemStatus {
            providers: self.dispatcher.probe().await,
            personas_loaded: self.personas.list().len(),
            channels_available: self.channels.list().len(),
            conversations_active: self.memory.stats().total_conversations,
            current_persona: self.personas.current().map(|p| p.id.clone()),
            current_channel: self.channels.current().id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatRequest;
    use async_trait::async_trait;
    use bk25_agent::provider::{LlmProvider, LlmReply, ProviderError};
    use bk25_codegen::types::{GenerationMethod, PlatformChoice};
    use bk25_core::config::Bk25Config;

    /// Core wired to a canned provider (or to none at all).
    fn core_with_provider(reply: Option<&'static str>) -> Arc<Bk25Core> {
        struct Canned(&'static str);

        #[async_trait]
        impl LlmProvider for Canned {
            fn name(&self) -> &str {
                "canned"
            }
            async fn generate(&self, _req: &LlmRequest) -> std::result::Result<LlmReply, ProviderError> {
                Ok(LlmReply {
                    content: self.0.to_string(),
                    model: "canned-model".to_string(),
                    provider: "canned".to_string(),
                    usage: None,
                })
            }
            async fn is_available(&self) -> bool {
                true
            }
        }

        let mut config = Bk25Config::default();
        config.personas.path = "/nonexistent/personas".to_string();
        config.llm.ollama = None; // no network probes in tests

        let core = Bk25Core::new(config);
        // Rebuild with the stub provider in place of the configured set.
        let providers: Vec<Arc<dyn LlmProvider>> = match reply {
            Some(text) => vec![Arc::new(Canned(text))],
            None => Vec::new(),
        };
        let dispatcher = Arc::new(LlmDispatcher::new(providers, None));
        let generator = Arc::new(CodeGenerator::new(Arc::clone(&dispatcher)));
        Arc::new(Bk25Core {
            config: core.config.clone(),
            personas: PersonaRegistry::new("/nonexistent/personas"),
            channels: ChannelRegistry::new(),
            memory: ConversationStore::new(100, 50),
            dispatcher,
            generator,
            supervisor: ExecutionSupervisor::new(core.config.executor.clone()),
        })
    }

    #[tokio::test]
    async fn chat_extracts_the_first_fenced_block() {
        let core = core_with_provider(Some("Sure!\n```bash\necho hi\n```\nEnjoy."));
        core.personas.load_all();

        let outcome = core
            .chat(ChatRequest {
                message: "write me a script".to_string(),
                conversation_id: "c1".to_string(),
                persona_id: None,
                channel_id: None,
                context: None,
            })
            .await
            .unwrap();

        assert!(!outcome.response.contains("```"));
        let code = outcome.extracted_code.unwrap();
        assert_eq!(code.language, "bash");
        assert_eq!(code.code, "echo hi");
        assert!(code.filename.starts_with("Generated Bash"));

        // Both turns are recorded, assistant side with the raw fence.
        let history = core.conversation_history("c1", None);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert!(history[1].content.contains("```bash"));
    }

    #[tokio::test]
    async fn chat_without_provider_is_llm_unavailable() {
        let core = core_with_provider(None);
        core.personas.load_all();

        let err = core
            .chat(ChatRequest {
                message: "hello".to_string(),
                conversation_id: "c1".to_string(),
                persona_id: None,
                channel_id: None,
                context: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "llm_unavailable");
    }

    #[tokio::test]
    async fn chat_rejects_empty_message() {
        let core = core_with_provider(Some("hi"));
        let err = core
            .chat(ChatRequest {
                message: "   ".to_string(),
                conversation_id: "c1".to_string(),
                persona_id: None,
                channel_id: None,
                context: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[tokio::test]
    async fn generate_script_falls_back_without_provider() {
        let core = core_with_provider(None);
        core.personas.load_all();

        let result = core
            .generate_script(GenerationRequest::new(
                "Get system information",
                PlatformChoice::PowerShell,
            ))
            .await;
        assert!(result.success);
        assert!(matches!(
            result.metadata.generation_method,
            GenerationMethod::Template | GenerationMethod::BasicSkeleton
        ));
    }

    #[tokio::test]
    async fn switch_persona_not_found_maps_to_error() {
        let core = core_with_provider(None);
        core.personas.load_all();

        let err = core.switch_persona("nope").unwrap_err();
        assert_eq!(err.code(), "not_found");

        // The fallback persona exists after load_all.
        assert!(core.switch_persona("fallback").is_ok());
    }

    #[tokio::test]
    async fn create_persona_validates_descriptor() {
        let core = core_with_provider(None);
        core.personas.load_all();

        let err = core
            .create_persona(serde_json::json!({"id": "x"}))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");

        let persona = core
            .create_persona(serde_json::json!({
                "id": "ops",
                "name": "Ops",
                "description": "ops persona",
                "greeting": "hi",
                "systemPrompt": "You are ops."
            }))
            .unwrap();
        assert!(persona.custom);

        let err = core
            .create_persona(serde_json::json!({
                "id": "ops",
                "name": "Ops",
                "description": "dup",
                "greeting": "hi",
                "systemPrompt": "x"
            }))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[tokio::test]
    async fn switch_channel_returns_kinds_and_capabilities() {
        let core = core_with_provider(None);
        let view = core.switch_channel("slack").unwrap();
        assert_eq!(view.channel.id, "slack");
        assert!(view.artifact_kinds.contains(&"blocks".to_string()));
        assert!(view.capabilities.contains(&"threads".to_string()));

        assert_eq!(core.switch_channel("irc").unwrap_err().code(), "not_found");
    }

    #[tokio::test]
    async fn task_lookup_errors_are_not_found() {
        let core = core_with_provider(None);
        assert_eq!(core.task_status("ghost").unwrap_err().code(), "not_found");
        assert_eq!(core.task_metrics("ghost").unwrap_err().code(), "not_found");
        assert!(!core.cancel_task("ghost"));
    }

    #[tokio::test]
    async fn system_status_reflects_registries() {
        let core = core_with_provider(None);
        core.personas.load_all();

        let status = core.system_status().await;
        assert_eq!(status.channels_available, 7);
        assert_eq!(status.current_channel, "web");
        assert_eq!(status.personas_loaded, 1); // fallback only
        assert!(status.current_persona.is_some());
    }
}
