//! Prompt composition for script generation.
//!
//! Pure functions from `(persona, channel, preferences, history, task)` to a
//! structured prompt record. The system message starts from a platform expert
//! preamble and is augmented with persona, channel, recent-conversation, and
//! preference lines.

use serde::{Deserialize, Serialize};

use bk25_core::types::Platform;

use crate::types::GenerationOptions;

/// How many trailing conversation messages feed the prompt summary.
const HISTORY_SUMMARY_WINDOW: usize = 3;
/// How much of each summarized message survives.
const HISTORY_PREVIEW_CHARS: usize = 100;

/// One conversation message available to the composer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

/// Context threading persona/channel/conversation into the prompt.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub persona_id: String,
    pub persona_name: String,
    pub persona_description: String,
    pub persona_capabilities: Vec<String>,
    pub channel_id: String,
    pub channel_name: String,
    pub conversation_history: Vec<HistoryMessage>,
}

impl Default for PromptContext {
    fn default() -> Self {
        Self {
            persona_id: "default".to_string(),
            persona_name: "Default Persona".to_string(),
            persona_description: "General automation expert".to_string(),
            persona_capabilities: vec![
                "script_generation".to_string(),
                "automation".to_string(),
            ],
            channel_id: "web".to_string(),
            channel_name: "Web Interface".to_string(),
            conversation_history: Vec::new(),
        }
    }
}

/// Structured prompt for script generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptPrompt {
    pub system_message: String,
    pub user_prompt: String,
    pub context: String,
    pub examples: Vec<String>,
    pub constraints: Vec<String>,
    pub output_format: String,
}

impl ScriptPrompt {
    /// Single-string form handed to providers that take one prompt.
    pub fn flattened(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            self.system_message, self.user_prompt, self.output_format
        )
    }
}

fn base_system_message(platform: Platform) -> &'static str {
    match platform {
        Platform::PowerShell => {
            "You are an expert PowerShell automation engineer. You create production-ready, \
             enterprise-grade PowerShell scripts that follow Microsoft best practices.\n\n\
             Key Requirements:\n\
             - Always include proper error handling with try/catch blocks\n\
             - Use parameter validation and help documentation\n\
             - Follow PowerShell naming conventions and style guidelines\n\
             - Include Write-Host for user feedback and progress indication\n\
             - Make scripts robust and suitable for production environments\n\
             - Handle edge cases and provide meaningful error messages\n\
             - Use approved PowerShell cmdlets and avoid deprecated commands"
        }
        Platform::AppleScript => {
            "You are an expert AppleScript automation engineer. You create production-ready, \
             user-friendly AppleScripts that follow Apple's best practices.\n\n\
             Key Requirements:\n\
             - Always include proper error handling with try/on error blocks\n\
             - Use display notification and display dialog for user feedback\n\
             - Check application availability before controlling them\n\
             - Follow AppleScript naming conventions and style guidelines\n\
             - Make scripts robust and suitable for production use\n\
             - Handle edge cases gracefully with user-friendly messages\n\
             - Use modern AppleScript syntax and avoid deprecated commands"
        }
        Platform::Bash => {
            "You are an expert Bash automation engineer. You create production-ready, portable \
             Bash scripts that follow Unix/Linux best practices.\n\n\
             Key Requirements:\n\
             - Always include proper error handling with set -e and trap\n\
             - Use parameter validation and help functions\n\
             - Follow Bash naming conventions and style guidelines\n\
             - Include echo statements for user feedback and progress\n\
             - Make scripts robust and suitable for production use\n\
             - Handle edge cases and provide meaningful error messages\n\
             - Use portable commands and avoid system-specific features"
        }
    }
}

fn quality_constraints(platform: Platform) -> Vec<String> {
    let items: &[&str] = match platform {
        Platform::PowerShell => &[
            "Must include parameter validation",
            "Must use try/catch error handling",
            "Must include Write-Host for user feedback",
            "Must follow PowerShell naming conventions",
            "Must be suitable for enterprise environments",
        ],
        Platform::AppleScript => &[
            "Must include error handling with try/on error",
            "Must check application availability",
            "Must use display notification for feedback",
            "Must follow AppleScript conventions",
            "Must be user-friendly and robust",
        ],
        Platform::Bash => &[
            "Must include set -e and trap for error handling",
            "Must validate parameters and provide help",
            "Must use echo for user feedback",
            "Must follow Bash conventions",
            "Must be portable and robust",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

fn output_format(platform: Platform) -> String {
    format!(
        "Generate only the {name} script code. Do not include markdown formatting, \
         explanations, or additional text. The output should be a complete, executable \
         {name} script that can be saved directly to a .{ext} file.",
        name = platform.display_name(),
        ext = platform.file_extension()
    )
}

/// Compose the full generation prompt for a request.
pub fn create_generation_prompt(
    description: &str,
    platform: Platform,
    context: &PromptContext,
    options: &GenerationOptions,
) -> ScriptPrompt {
    ScriptPrompt {
        system_message: enhance_system_message(base_system_message(platform), context, options),
        user_prompt: build_user_prompt(description, platform, options),
        context: build_context_info(context),
        examples: relevant_examples(description),
        constraints: quality_constraints(platform),
        output_format: output_format(platform),
    }
}

fn enhance_system_message(
    base: &str,
    context: &PromptContext,
    options: &GenerationOptions,
) -> String {
    let mut enhancements = Vec::new();

    if !context.persona_capabilities.is_empty() {
        enhancements.push(format!(
            "Persona: {} - {}",
            context.persona_name, context.persona_description
        ));
        enhancements.push(format!(
            "Capabilities: {}",
            context.persona_capabilities.join(", ")
        ));
    }

    if context.channel_id != "web" {
        enhancements.push(format!(
            "Channel: {} - Adapt output for {} communication",
            context.channel_name, context.channel_id
        ));
    }

    if !context.conversation_history.is_empty() {
        let summary = summarize_history(&context.conversation_history);
        if !summary.is_empty() {
            enhancements.push(format!("Conversation Context: {}", summary));
        }
    }

    let mut prefs = Vec::new();
    if options.verbose {
        prefs.push("prefer verbose output with detailed comments");
    }
    if options.minimal {
        prefs.push("prefer minimal, concise code");
    }
    if options.enterprise {
        prefs.push("focus on enterprise-grade security and compliance");
    }
    if !prefs.is_empty() {
        enhancements.push(format!("User Preferences: {}", prefs.join(", ")));
    }

    if enhancements.is_empty() {
        base.to_string()
    } else {
        let lines: Vec<String> = enhancements.iter().map(|e| format!("- {}", e)).collect();
        format!("{}\n\nAdditional Context:\n{}", base, lines.join("\n"))
    }
}

fn build_user_prompt(
    description: &str,
    platform: Platform,
    options: &GenerationOptions,
) -> String {
    let mut parts = vec![format!("Create a {} script for: {}", platform, description)];

    if options.include_tests {
        parts.push("Include unit tests or validation checks".to_string());
    }
    if options.include_documentation {
        parts.push("Include comprehensive inline documentation".to_string());
    }
    if options.include_logging {
        parts.push("Include logging and audit trail functionality".to_string());
    }
    if options.include_error_handling {
        parts.push("Include robust error handling and recovery".to_string());
    }
    if options.include_parameter_validation {
        parts.push("Include comprehensive parameter validation".to_string());
    }
    if options.include_help {
        parts.push("Include detailed help and usage information".to_string());
    }
    if options.include_examples {
        parts.push("Include usage examples in comments".to_string());
    }

    parts.push(
        match platform {
            Platform::PowerShell => {
                "Ensure the script follows PowerShell execution policy best practices"
            }
            Platform::AppleScript => {
                "Ensure the script provides clear user feedback and handles errors gracefully"
            }
            Platform::Bash => {
                "Ensure the script is portable and handles different Unix/Linux environments"
            }
        }
        .to_string(),
    );

    parts.join("\n")
}

fn build_context_info(context: &PromptContext) -> String {
    let mut parts = vec![
        format!("Persona: {}", context.persona_name),
        format!("Description: {}", context.persona_description),
        format!("Channel: {}", context.channel_name),
    ];
    if !context.conversation_history.is_empty() {
        parts.push(format!(
            "Recent Conversation: {} messages available",
            context.conversation_history.len()
        ));
    }
    parts.join("\n")
}

fn relevant_examples(description: &str) -> Vec<String> {
    let lower = description.to_lowercase();
    let mut examples = Vec::new();

    if lower.contains("file") && lower.contains("process") {
        examples.push("File processing examples available for reference".to_string());
    }
    if lower.contains("system") && lower.contains("monitor") {
        examples.push("System monitoring examples available for reference".to_string());
    }
    if lower.contains("backup") {
        examples.push("Backup automation examples available for reference".to_string());
    }
    if lower.contains("email") {
        examples.push("Email automation examples available for reference".to_string());
    }
    examples
}

fn summarize_history(history: &[HistoryMessage]) -> String {
    let tail_start = history.len().saturating_sub(HISTORY_SUMMARY_WINDOW);
    history[tail_start..]
        .iter()
        .filter_map(|m| {
            let preview: String = m.content.chars().take(HISTORY_PREVIEW_CHARS).collect();
            match m.role.as_str() {
                "user" => Some(format!("User requested: {}...", preview)),
                "assistant" => Some(format!("Assistant provided: {}...", preview)),
                _ => None,
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Second-pass prompt: improve an existing script on feedback while keeping
/// its core behavior.
pub fn create_improvement_prompt(
    original_script: &str,
    feedback: &str,
    platform: Platform,
    context: &PromptContext,
) -> ScriptPrompt {
    let system_message = format!(
        "You are an expert {platform} automation engineer tasked with improving an existing \
         script based on user feedback.\n\n\
         Your task is to:\n\
         1. Analyze the existing script\n\
         2. Understand the user's feedback and requirements\n\
         3. Improve the script while maintaining its core functionality\n\
         4. Ensure all improvements follow {platform} best practices\n\
         5. Provide a complete, improved version of the script\n\n\
         Focus on addressing the specific feedback while maintaining or improving code quality.",
        platform = platform.display_name()
    );

    let user_prompt = format!(
        "Improve the following {platform} script based on this feedback:\n\n\
         FEEDBACK: {feedback}\n\n\
         ORIGINAL SCRIPT:\n{original_script}\n\n\
         Please provide an improved version that addresses the feedback while maintaining \
         the script's core functionality.",
        platform = platform.display_name()
    );

    ScriptPrompt {
        system_message,
        user_prompt,
        context: build_context_info(context),
        examples: Vec::new(),
        constraints: quality_constraints(platform),
        output_format: output_format(platform),
    }
}

/// Review prompt: structured analysis with a 1–10 score, issues, suggestions,
/// and security notes.
pub fn create_validation_prompt(
    script: &str,
    platform: Platform,
    context: &PromptContext,
) -> ScriptPrompt {
    let system_message = format!(
        "You are an expert {platform} code reviewer and automation engineer. Your task is to \
         analyze the provided script and provide:\n\n\
         1. A validation score (1-10)\n\
         2. Specific issues found\n\
         3. Improvement suggestions\n\
         4. Security considerations\n\
         5. Best practice recommendations\n\n\
         Be thorough but constructive in your feedback.",
        platform = platform.display_name()
    );

    let user_prompt = format!(
        "Please review and validate this {platform} script:\n\n{script}\n\n\
         Provide a comprehensive analysis including validation score, issues, improvements, \
         and recommendations.",
        platform = platform.display_name()
    );

    ScriptPrompt {
        system_message,
        user_prompt,
        context: build_context_info(context),
        examples: Vec::new(),
        constraints: Vec::new(),
        output_format: "Provide your analysis in a structured format with clear sections for \
                        each aspect of the review."
            .to_string(),
    }
}
