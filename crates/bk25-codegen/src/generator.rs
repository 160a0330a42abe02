//! Script generation orchestrator: platform resolution, prompt construction,
//! LLM attempt with template fallback, output parsing, and static validation.

use std::sync::Arc;

use tracing::{info, warn};

use bk25_agent::provider::LlmRequest;
use bk25_agent::LlmDispatcher;
use bk25_core::types::Platform;

use crate::parse::parse_generated;
use crate::platform::{resolve_platform, suggestions as platform_suggestions, AUTOMATION_PATTERNS};
use crate::prompt::{
    create_generation_prompt, create_improvement_prompt, create_validation_prompt, PromptContext,
};
use crate::templates::{
    basic_skeleton, best_template, template_names, templates_for, TEMPLATE_MATCH_THRESHOLD,
};
use crate::types::{
    GenerationMetadata, GenerationMethod, GenerationOptions, GenerationRequest, GenerationResult,
    GenerationStatistics, PlatformInfo, ScriptReview, Suggestion,
};
use crate::validate::validate_script;

/// Low temperature keeps generated code deterministic.
const CODEGEN_TEMPERATURE: f32 = 0.1;

pub struct CodeGenerator {
    dispatcher: Arc<LlmDispatcher>,
}

impl CodeGenerator {
    pub fn new(dispatcher: Arc<LlmDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Generate a script for the request.
    ///
    /// The LLM path is attempted first; any dispatcher failure falls back to
    /// template generation without surfacing the LLM error. A script failing
    /// static validation flips `success` to false but is still returned.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        context: Option<&PromptContext>,
    ) -> GenerationResult {
        let platform = resolve_platform(request.platform, &request.description);
        let options = request.options.clone().unwrap_or_default();
        let default_context = PromptContext::default();
        let context = context.unwrap_or(&default_context);

        info!(
            platform = %platform,
            description = %truncate(&request.description, 50),
            "generating script"
        );

        match self
            .try_llm(&request.description, platform, context, &options)
            .await
        {
            Some(result) => result,
            None => self.generate_from_template(&request.description, platform),
        }
    }

    async fn try_llm(
        &self,
        description: &str,
        platform: Platform,
        context: &PromptContext,
        options: &GenerationOptions,
    ) -> Option<GenerationResult> {
        let prompt = create_generation_prompt(description, platform, context, options);

        let llm_request = LlmRequest::new(prompt.flattened())
            .with_system(prompt.system_message.clone())
            .with_temperature(CODEGEN_TEMPERATURE)
            .with_max_tokens(options.max_tokens);

        let reply = match self.dispatcher.generate(&llm_request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(err = %e, "LLM generation failed, falling back to template");
                return None;
            }
        };

        let parsed = parse_generated(&reply.content, description, platform);
        let mut metadata = GenerationMetadata::for_method(GenerationMethod::Llm, platform);
        metadata.provider = Some(reply.provider);
        metadata.model = Some(reply.model);
        metadata.token_usage = reply.usage;

        Some(finish(parsed, metadata, platform))
    }

    fn generate_from_template(&self, description: &str, platform: Platform) -> GenerationResult {
        let (script, mut metadata) = match best_template(platform, description) {
            Some((template, score)) if score > TEMPLATE_MATCH_THRESHOLD => {
                info!(template = template.name, score, "using matched template");
                let mut metadata =
                    GenerationMetadata::for_method(GenerationMethod::Template, platform);
                metadata.template_name = Some(template.name.to_string());
                metadata.match_score = Some(score);
                (template.template.to_string(), metadata)
            }
            _ => {
                info!("no template match, using basic skeleton");
                let metadata =
                    GenerationMetadata::for_method(GenerationMethod::BasicSkeleton, platform);
                (basic_skeleton(platform, description), metadata)
            }
        };

        if metadata.match_score.is_none() {
            metadata.match_score = Some(0.0);
        }
        let parsed = parse_generated(&script, description, platform);
        finish(parsed, metadata, platform)
    }

    /// Second-pass improvement of an existing script. LLM-only: with no
    /// provider available the caller gets the failure directly.
    pub async fn improve_script(
        &self,
        script: &str,
        feedback: &str,
        platform: Platform,
        context: Option<&PromptContext>,
    ) -> GenerationResult {
        let default_context = PromptContext::default();
        let context = context.unwrap_or(&default_context);
        let prompt = create_improvement_prompt(script, feedback, platform, context);

        let llm_request = LlmRequest::new(prompt.flattened())
            .with_system(prompt.system_message.clone())
            .with_temperature(CODEGEN_TEMPERATURE);

        match self.dispatcher.generate(&llm_request).await {
            Ok(reply) => {
                let parsed = parse_generated(&reply.content, feedback, platform);
                let mut metadata = GenerationMetadata::for_method(GenerationMethod::Llm, platform);
                metadata.provider = Some(reply.provider);
                metadata.model = Some(reply.model);
                metadata.token_usage = reply.usage;
                finish(parsed, metadata, platform)
            }
            Err(e) => GenerationResult {
                success: false,
                script: None,
                filename: None,
                documentation: None,
                validation: None,
                error: Some(format!("script improvement requires an LLM provider: {}", e)),
                metadata: GenerationMetadata::for_method(GenerationMethod::Llm, platform),
            },
        }
    }

    /// Structured review of a script: deterministic checks always run, the
    /// LLM analysis is attached when a provider answers.
    pub async fn review_script(
        &self,
        script: &str,
        platform: Platform,
        context: Option<&PromptContext>,
    ) -> ScriptReview {
        let validation = validate_script(script, platform);

        let default_context = PromptContext::default();
        let context = context.unwrap_or(&default_context);
        let prompt = create_validation_prompt(script, platform, context);
        let llm_request = LlmRequest::new(prompt.flattened())
            .with_system(prompt.system_message.clone())
            .with_temperature(CODEGEN_TEMPERATURE);

        match self.dispatcher.generate(&llm_request).await {
            Ok(reply) => ScriptReview {
                validation,
                analysis: Some(reply.content),
                provider: Some(reply.provider),
            },
            Err(e) => {
                warn!(err = %e, "LLM review unavailable, returning static validation only");
                ScriptReview {
                    validation,
                    analysis: None,
                    provider: None,
                }
            }
        }
    }

    pub fn suggestions(&self, description: &str) -> Vec<Suggestion> {
        platform_suggestions(description)
    }

    pub fn supported_platforms(&self) -> Vec<Platform> {
        Platform::ALL.to_vec()
    }

    pub fn platform_info(&self, platform: Platform) -> PlatformInfo {
        PlatformInfo {
            platform,
            file_extension: platform.file_extension(),
            templates: template_names(platform),
        }
    }

    /// Run several generation requests concurrently, preserving order.
    /// A panicking request is isolated into its own failed result.
    pub async fn generate_batch(
        self: &Arc<Self>,
        requests: Vec<GenerationRequest>,
    ) -> Vec<GenerationResult> {
        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let generator = Arc::clone(self);
                tokio::spawn(async move { generator.generate(&request, None).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (i, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(GenerationResult {
                    success: false,
                    script: None,
                    filename: None,
                    documentation: None,
                    validation: None,
                    error: Some(format!("batch generation error for request {}: {}", i, e)),
                    metadata: GenerationMetadata::for_method(
                        GenerationMethod::BasicSkeleton,
                        Platform::Bash,
                    ),
                }),
            }
        }
        results
    }

    pub fn statistics(&self) -> GenerationStatistics {
        GenerationStatistics {
            total_platforms: Platform::ALL.len(),
            total_templates: Platform::ALL
                .iter()
                .map(|p| templates_for(*p).len())
                .sum(),
            automation_patterns: AUTOMATION_PATTERNS.len(),
        }
    }
}

/// Validate and package a parsed script into the final result.
fn finish(
    parsed: crate::parse::ParsedScript,
    metadata: GenerationMetadata,
    platform: Platform,
) -> GenerationResult {
    let validation = validate_script(&parsed.script, platform);
    let success = validation.is_valid;
    let error = if success {
        None
    } else {
        Some(format!(
            "Script validation failed: {}",
            validation.issues.join(", ")
        ))
    };

    GenerationResult {
        success,
        script: Some(parsed.script),
        filename: Some(parsed.filename),
        documentation: parsed.documentation,
        validation: Some(validation),
        error,
        metadata,
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
