pub mod generator;
pub mod parse;
pub mod platform;
pub mod prompt;
pub mod templates;
pub mod types;
pub mod validate;

pub use generator::CodeGenerator;
pub use platform::{resolve_platform, suggestions};
pub use prompt::{PromptContext, ScriptPrompt};
pub use types::{
    GenerationMetadata, GenerationMethod, GenerationOptions, GenerationRequest, GenerationResult,
    PlatformChoice, ScriptValidation, Suggestion,
};
