use serde::{Deserialize, Serialize};

use bk25_agent::provider::TokenUsage;
use bk25_core::types::Platform;

/// Requested target platform; `auto` defers to keyword detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformChoice {
    #[default]
    Auto,
    #[serde(rename = "powershell")]
    PowerShell,
    #[serde(rename = "applescript")]
    AppleScript,
    Bash,
}

impl PlatformChoice {
    pub fn fixed(&self) -> Option<Platform> {
        match self {
            PlatformChoice::Auto => None,
            PlatformChoice::PowerShell => Some(Platform::PowerShell),
            PlatformChoice::AppleScript => Some(Platform::AppleScript),
            PlatformChoice::Bash => Some(Platform::Bash),
        }
    }
}

impl From<Platform> for PlatformChoice {
    fn from(p: Platform) -> Self {
        match p {
            Platform::PowerShell => PlatformChoice::PowerShell,
            Platform::AppleScript => PlatformChoice::AppleScript,
            Platform::Bash => PlatformChoice::Bash,
        }
    }
}

/// Recognized generation options. Unknown keys in incoming JSON are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub include_tests: bool,
    #[serde(default)]
    pub include_documentation: bool,
    #[serde(default)]
    pub include_logging: bool,
    #[serde(default)]
    pub include_error_handling: bool,
    #[serde(default)]
    pub include_parameter_validation: bool,
    #[serde(default)]
    pub include_help: bool,
    #[serde(default)]
    pub include_examples: bool,
    /// Prompt-shaping preference flags.
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub minimal: bool,
    #[serde(default)]
    pub enterprise: bool,
    /// LLM budget hint.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            include_tests: false,
            include_documentation: false,
            include_logging: false,
            include_error_handling: false,
            include_parameter_validation: false,
            include_help: false,
            include_examples: false,
            verbose: false,
            minimal: false,
            enterprise: false,
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> u32 {
    2048
}

/// Script generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub description: String,
    #[serde(default)]
    pub platform: PlatformChoice,
    #[serde(default)]
    pub options: Option<GenerationOptions>,
    #[serde(default)]
    pub persona_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

impl GenerationRequest {
    pub fn new(description: impl Into<String>, platform: PlatformChoice) -> Self {
        Self {
            description: description.into(),
            platform,
            options: None,
            persona_id: None,
            channel_id: None,
        }
    }
}

/// How the script text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    Llm,
    Template,
    BasicSkeleton,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub generation_method: GenerationMethod,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl GenerationMetadata {
    pub fn for_method(method: GenerationMethod, platform: Platform) -> Self {
        Self {
            generation_method: method,
            platform,
            template_name: None,
            match_score: None,
            provider: None,
            model: None,
            token_usage: None,
        }
    }
}

/// Deterministic static-validation verdict for a generated script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptValidation {
    pub is_valid: bool,
    pub issues: Vec<String>,
    /// 0–100, penalized per issue.
    pub score: u8,
}

/// Script generation result. `success == false` with a populated `script`
/// means the text failed validation but is still returned for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ScriptValidation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: GenerationMetadata,
}

/// One automation-pattern suggestion for a description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub pattern: String,
    pub platforms: Vec<Platform>,
    pub description: String,
    pub recommended_platform: Platform,
}

/// Structured review returned by `validate_script`: the deterministic checks
/// always run; the LLM analysis rides along when a provider was reachable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptReview {
    pub validation: ScriptValidation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Per-platform capability summary for the `platforms()` facade operation.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    pub platform: Platform,
    pub file_extension: &'static str,
    pub templates: Vec<String>,
}

/// Aggregate counts for the generation subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStatistics {
    pub total_platforms: usize,
    pub total_templates: usize,
    pub automation_patterns: usize,
}
