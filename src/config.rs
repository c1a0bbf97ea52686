/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: tribunal.toml (in working directory)
/// 3. Environment variables: prefixed TRIBUNAL_, `__` separates sections
///    (e.g., TRIBUNAL_LOG_LEVEL=debug, TRIBUNAL_GROQ__API_KEY=...)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use crate::errors::AssistError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional file path for JSON log output (in addition to stderr)
    #[serde(default)]
    pub log_file: Option<String>,

    /// Settings file holding the provider selection and API keys.
    /// Defaults to <config dir>/tribunal-assist/settings.json
    #[serde(default)]
    pub settings_path: Option<String>,

    #[serde(default = "CloudConfig::gemini")]
    pub gemini: CloudConfig,

    #[serde(default = "CloudConfig::groq")]
    pub groq: CloudConfig,

    #[serde(default)]
    pub local: LocalConfig,
}

/// One OpenAI-compatible cloud endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    pub base_url: String,
    pub model: String,
    /// Used when neither the call nor the settings file supplies a key
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_cloud_temperature")]
    pub temperature: f32,
    #[serde(default = "default_cloud_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CloudConfig {
    pub fn gemini() -> Self {
        CloudConfig {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            temperature: default_cloud_temperature(),
            max_tokens: 8192,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn groq() -> Self {
        CloudConfig {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            temperature: default_cloud_temperature(),
            max_tokens: default_cloud_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Local model runtime (Ollama-hosted).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub base_url: String,
    pub model: String,
    /// Documents longer than this are cut before local analysis
    pub max_document_chars: usize,
    /// Most recent chat turns forwarded to the local model
    pub chat_history_turns: usize,
    /// Case context characters forwarded with each chat turn
    pub chat_context_chars: usize,
    pub context_window: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// The first pull downloads the weights and can take a long time
    pub pull_timeout_secs: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        LocalConfig {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            max_document_chars: 6000,
            chat_history_turns: 6,
            chat_context_chars: 2000,
            context_window: 4096,
            temperature: 0.2,
            timeout_secs: 300,
            pull_timeout_secs: 3600,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cloud_temperature() -> f32 {
    0.2
}

fn default_cloud_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            log_file: None,
            settings_path: None,
            gemini: CloudConfig::gemini(),
            groq: CloudConfig::groq(),
            local: LocalConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: TRIBUNAL_LOCAL__MODEL=phi3 overrides local.model in tribunal.toml
    pub fn load() -> Result<Config, AssistError> {
        Self::figment("tribunal.toml")
            .extract()
            .map_err(|e| AssistError::Configuration(format!("Failed to load config: {}", e)))
    }

    fn figment(toml_path: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("TRIBUNAL_").split("__"))
    }
}
