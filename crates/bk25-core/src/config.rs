use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3003;
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Top-level config (bk25.toml + BK25_* env overrides).
///
/// There are no implicit globals: the loaded value is handed to
/// `Bk25Core::new` and flows down from there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bk25Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub personas: PersonasConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl Default for Bk25Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            personas: PersonasConfig::default(),
            llm: LlmConfig::default(),
            memory: MemoryConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonasConfig {
    /// Directory of persona descriptor files (one JSON record per file).
    #[serde(default = "default_personas_path")]
    pub path: String,
}

impl Default for PersonasConfig {
    fn default() -> Self {
        Self {
            path: default_personas_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider tried first when available. Falls back to configuration order.
    #[serde(default)]
    pub preferred_provider: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub ollama: Option<OllamaConfig>,
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            preferred_provider: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            ollama: Some(OllamaConfig::default()),
            openai: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
    #[serde(default = "default_max_messages")]
    pub max_messages_per_conversation: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_conversations: default_max_conversations(),
            max_messages_per_conversation: default_max_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,
    /// Default wall-clock budget for a task when the caller gives none.
    #[serde(default = "default_task_timeout")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: f64,
    /// Terminal tasks older than this are swept hourly.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            default_timeout_secs: default_task_timeout(),
            metrics_interval_secs: default_metrics_interval(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_personas_path() -> String {
    "./data/personas".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_openai_model() -> String {
    "gpt-4o".to_string()
}
fn default_max_conversations() -> usize {
    100
}
fn default_max_messages() -> usize {
    50
}
fn default_max_concurrent() -> usize {
    5
}
fn default_task_timeout() -> u64 {
    300
}
fn default_metrics_interval() -> f64 {
    1.0
}
fn default_retention_days() -> i64 {
    7
}

impl Bk25Config {
    /// Load config from a TOML file with BK25_* env var overrides.
    ///
    /// A missing file is not an error: defaults apply and env vars still win.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("bk25.toml");

        let config: Bk25Config = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("BK25_").split("_"))
            .extract()
            .map_err(|e| crate::error::Bk25Error::Config(e.to_string()))?;

        Ok(config)
    }
}
