pub mod validation;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub base_path: String,
    /// Bound on opening the upstream stream, on each streamed line, and on the
    /// non-streaming fallback call.
    pub stream_timeout_secs: u64,
    /// Bound on plain non-streaming driver calls (chat, images, speech).
    pub request_timeout_secs: u64,
    pub models_timeout_secs: u64,
    pub http_pool_max_idle_per_host: usize,
    pub http_pool_idle_timeout_secs: u64,
    pub max_request_body_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9595,
            host: "0.0.0.0".to_string(),
            base_path: String::new(),
            stream_timeout_secs: 30,
            request_timeout_secs: 120,
            models_timeout_secs: 30,
            http_pool_max_idle_per_host: 16,
            http_pool_idle_timeout_secs: 15,
            max_request_body_bytes: 20 * 1024 * 1024,
            runtime_worker_threads: None,
        }
    }
}

/// Where and how the Puter driver API is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_url: String,
    pub models_url: String,
    pub origin: String,
    pub referer: String,
    pub user_agent: String,
    pub chat_interface: String,
    pub chat_method: String,
    pub default_driver: String,
    pub default_model: String,
    pub owned_by: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.puter.com/drivers/call".to_string(),
            models_url: "https://puter.com/puterai/chat/models".to_string(),
            origin: "https://docs.puter.com".to_string(),
            referer: "https://docs.puter.com/".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            chat_interface: "puter-chat-completion".to_string(),
            chat_method: "complete".to_string(),
            default_driver: "openai-completion".to_string(),
            default_model: "gpt-4.1-nano".to_string(),
            owned_by: "puter".to_string(),
        }
    }
}

/// Upstream credential resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Environment variable read once at startup as the fallback credential.
    pub token_env: String,
    /// A bearer key from the request header is used only when strictly longer than this.
    pub min_header_key_len: usize,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            token_env: "API_TOKEN".to_string(),
            min_header_key_len: 8,
        }
    }
}

/// Model quirks and the static catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Models known to reject a `temperature` argument.
    pub no_temperature: Vec<String>,
    /// Served by `/v1/models` when the upstream catalog cannot be fetched.
    pub fallback: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            no_temperature: ["o3-mini", "o3", "o4-mini"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            fallback: DEFAULT_FALLBACK_MODELS
                .iter()
                .copied()
                .map(str::to_string)
                .collect(),
        }
    }
}

const DEFAULT_FALLBACK_MODELS: &[&str] = &[
    "gpt-4o-mini",
    "gpt-4o",
    "o1",
    "o1-mini",
    "o1-pro",
    "o3",
    "o3-mini",
    "o4-mini",
    "gpt-5",
    "gpt-5-mini",
    "gpt-5-nano",
    "gpt-5-chat-latest",
    "gpt-4.1",
    "gpt-4.1-mini",
    "gpt-4.1-nano",
    "gpt-4.5-preview",
    "claude-sonnet-4",
    "claude-opus-4",
    "claude-3-7-sonnet",
    "claude-3-5-sonnet",
    "deepseek-chat",
    "deepseek-reasoner",
    "google/gemini-2.0-flash",
    "google/gemini-1.5-flash",
    "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo",
    "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo",
    "meta-llama/Meta-Llama-3.1-405B-Instruct-Turbo",
    "mistral-large-latest",
    "pixtral-large-latest",
    "codestral-latest",
    "google/gemma-2-27b-it",
    "grok-beta",
];

/// Text-to-speech mapping tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// OpenAI voice name -> Polly voice name.
    pub voices: BTreeMap<String, String>,
    pub default_voice: String,
    /// Response format -> MIME type.
    pub content_types: BTreeMap<String, String>,
    pub default_content_type: String,
    pub language: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let voices = [
            ("alloy", "Joanna"),
            ("echo", "Matthew"),
            ("fable", "Amy"),
            ("onyx", "Brian"),
            ("nova", "Emma"),
            ("shimmer", "Olivia"),
        ];
        let content_types = [
            ("mp3", "audio/mpeg"),
            ("opus", "audio/opus"),
            ("aac", "audio/aac"),
            ("flac", "audio/flac"),
        ];
        Self {
            voices: voices
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            default_voice: "Joanna".to_string(),
            content_types: content_types
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            default_content_type: "audio/mpeg".to_string(),
            language: "en-US".to_string(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub log_level: String,
    pub log_json: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            log_json: false,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub credentials: CredentialConfig,
    pub models: ModelsConfig,
    pub audio: AudioConfig,
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the built-in defaults.
///
/// # Errors
///
/// Same as [`load_config`] for every failure other than a missing file.
pub fn load_config_or_default(path: &str) -> Result<(AppConfig, bool), ConfigError> {
    match load_config(path) {
        Ok(config) => Ok((config, true)),
        Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            let config = AppConfig::default();
            validate_config(&config)?;
            Ok((config, false))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_example_config() {
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.server.port, 9595);
        assert_eq!(config.server.stream_timeout_secs, 30);
        assert_eq!(config.server.request_timeout_secs, 120);
        assert_eq!(config.upstream.default_driver, "openai-completion");
        assert!(config.models.no_temperature.iter().any(|m| m == "o3-mini"));
        assert_eq!(config.audio.voices.get("echo").map(String::as_str), Some("Matthew"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let (config, from_file) =
            load_config_or_default("definitely-not-here.yaml").expect("defaults");
        assert!(!from_file);
        assert_eq!(config.upstream.default_model, "gpt-4.1-nano");
        assert_eq!(config.credentials.token_env, "API_TOKEN");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: AppConfig = serde_yaml::from_str("server:\n  port: 8080\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.models.fallback.len(), DEFAULT_FALLBACK_MODELS.len());
    }
}
