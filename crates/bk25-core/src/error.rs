use thiserror::Error;

#[derive(Debug, Error)]
pub enum Bk25Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Policy violation: {reason}")]
    PolicyViolation { reason: String },

    #[error("No LLM provider available: {0}")]
    LlmUnavailable(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Bk25Error {
    /// Short error kind string exposed to transport adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Bk25Error::Config(_) => "config_error",
            Bk25Error::InvalidInput(_) => "invalid_input",
            Bk25Error::NotFound { .. } => "not_found",
            Bk25Error::PolicyViolation { .. } => "policy_violation",
            Bk25Error::LlmUnavailable(_) => "llm_unavailable",
            Bk25Error::ExecutionError(_) => "execution_error",
            Bk25Error::Timeout { .. } => "timeout",
            Bk25Error::Cancelled => "cancelled",
            Bk25Error::Serialization(_) => "invalid_input",
            Bk25Error::Io(_) => "execution_error",
            Bk25Error::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Bk25Error>;
