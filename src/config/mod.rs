//! Configuration module for the receptionist server
//!
//! Configuration comes from environment variables, optionally layered over a
//! YAML file. Environment variables always override YAML values.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use receptionist::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use utils::parse_bool;
pub use yaml::YamlConfig;

use crate::core::audio::DEFAULT_SAMPLE_RATE;
use crate::core::llm::{DEFAULT_SYSTEM_PROMPT, LLMConfig};
use crate::core::stt::STTConfig;
use crate::core::tts::TTSConfig;
use crate::core::turn::{DEFAULT_HISTORY_WINDOW, TurnSettings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid {key} value '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0}")]
    Validation(String),
    #[error("Server configuration error: Missing {0} API key")]
    MissingApiKey(&'static str),
}

/// Server configuration
///
/// Contains everything needed to run the server: listener address, provider
/// keys and per-call behaviour for recognition, reply generation and speech.
/// Missing provider keys are not a load error; calls fail at start instead.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Provider API keys
    pub deepgram_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub openai_base_url: String,

    // Speech recognition
    pub stt_model: String,
    pub stt_language: String,
    pub stt_sample_rate: u32,
    pub utterance_end_ms: u32,

    // Reply generation
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub system_prompt: Option<String>,
    pub max_tool_iterations: u32,
    pub tool_timeout_seconds: u64,
    pub history_window: usize,

    // Speech synthesis
    pub tts_provider: String,
    pub tts_model: Option<String>,
    pub tts_voice: Option<String>,
    pub tts_format: String,

    // Session tokens
    pub session_required: bool,
    pub session_ttl_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            deepgram_api_key: None,
            openai_api_key: None,
            elevenlabs_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            stt_model: "nova-2".to_string(),
            stt_language: "en-US".to_string(),
            stt_sample_rate: DEFAULT_SAMPLE_RATE,
            utterance_end_ms: 1200,
            llm_model: "gpt-4o-mini".to_string(),
            llm_temperature: 0.7,
            llm_max_tokens: 150,
            system_prompt: None,
            max_tool_iterations: 10,
            tool_timeout_seconds: 10,
            history_window: DEFAULT_HISTORY_WINDOW,
            tts_provider: "openai".to_string(),
            tts_model: None,
            tts_voice: None,
            tts_format: "mp3".to_string(),
            session_required: false,
            session_ttl_seconds: 300,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables
    /// 2. YAML file values
    /// 3. Default values
    ///
    /// The `.env` file is not read here; only real environment variables
    /// override the file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// API key for a provider, or the error reported to the caller when it is missing
    pub fn require_api_key(&self, provider: &str) -> Result<String, ConfigError> {
        let (key, name) = match provider.to_lowercase().as_str() {
            "deepgram" => (&self.deepgram_api_key, "Deepgram"),
            "openai" => (&self.openai_api_key, "OpenAI"),
            "elevenlabs" => (&self.elevenlabs_api_key, "ElevenLabs"),
            _ => {
                return Err(ConfigError::Validation(format!(
                    "Unsupported provider: {provider}"
                )));
            }
        };
        key.as_ref()
            .filter(|k| !k.is_empty())
            .cloned()
            .ok_or(ConfigError::MissingApiKey(name))
    }

    pub fn stt_config(&self) -> Result<STTConfig, ConfigError> {
        Ok(STTConfig {
            api_key: self.require_api_key("deepgram")?,
            model: self.stt_model.clone(),
            language: self.stt_language.clone(),
            sample_rate: self.stt_sample_rate,
            utterance_end_ms: self.utterance_end_ms,
            ..Default::default()
        })
    }

    pub fn llm_config(&self) -> Result<LLMConfig, ConfigError> {
        Ok(LLMConfig {
            api_key: self.require_api_key("openai")?,
            base_url: self.openai_base_url.clone(),
            model: self.llm_model.clone(),
            temperature: self.llm_temperature,
            max_tokens: self.llm_max_tokens,
            system_prompt: self
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tool_iterations: self.max_tool_iterations,
            tool_timeout_secs: self.tool_timeout_seconds,
        })
    }

    pub fn tts_config(&self) -> Result<TTSConfig, ConfigError> {
        let provider = self.tts_provider.to_lowercase();
        let is_openai = provider == "openai";
        let defaults = TTSConfig::default();

        Ok(TTSConfig {
            api_key: self.require_api_key(&provider)?,
            voice_id: self
                .tts_voice
                .clone()
                .or_else(|| if is_openai { defaults.voice_id.clone() } else { None }),
            model: self
                .tts_model
                .clone()
                .unwrap_or_else(|| if is_openai { defaults.model.clone() } else { String::new() }),
            audio_format: self.tts_format.clone(),
            provider,
            ..defaults
        })
    }

    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            sample_rate: self.stt_sample_rate,
            channels: 1,
            history_window: self.history_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "HOST",
        "PORT",
        "DEEPGRAM_API_KEY",
        "OPENAI_API_KEY",
        "ELEVENLABS_API_KEY",
        "OPENAI_BASE_URL",
        "LLM_MODEL",
        "LLM_TEMPERATURE",
        "LLM_MAX_TOKENS",
        "STT_MODEL",
        "STT_LANGUAGE",
        "STT_SAMPLE_RATE",
        "UTTERANCE_END_MS",
        "TTS_PROVIDER",
        "TTS_MODEL",
        "TTS_VOICE",
        "TTS_FORMAT",
        "HISTORY_WINDOW",
        "MAX_TOOL_ITERATIONS",
        "TOOL_TIMEOUT_SECONDS",
        "SESSION_REQUIRED",
        "SESSION_TTL_SECONDS",
        "SYSTEM_PROMPT",
    ];

    fn cleanup_env_vars() {
        for key in ENV_KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    fn config_with_keys() -> ServerConfig {
        ServerConfig {
            deepgram_api_key: Some("dg".to_string()),
            openai_api_key: Some("oa".to_string()),
            elevenlabs_api_key: Some("el".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_require_api_key_missing() {
        let config = ServerConfig::default();
        let err = config.require_api_key("deepgram").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Server configuration error: Missing Deepgram API key"
        );

        let empty = ServerConfig {
            openai_api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            empty.require_api_key("openai"),
            Err(ConfigError::MissingApiKey("OpenAI"))
        ));
        assert!(matches!(
            empty.require_api_key("whisper"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_component_configs() {
        let config = ServerConfig {
            stt_sample_rate: 8000,
            system_prompt: Some("Be brief.".to_string()),
            ..config_with_keys()
        };

        let stt = config.stt_config().unwrap();
        assert_eq!(stt.api_key, "dg");
        assert_eq!(stt.sample_rate, 8000);
        assert_eq!(stt.utterance_end_ms, 1200);

        let llm = config.llm_config().unwrap();
        assert_eq!(llm.system_prompt, "Be brief.");
        assert_eq!(llm.max_tokens, 150);

        let tts = config.tts_config().unwrap();
        assert_eq!(tts.provider, "openai");
        assert_eq!(tts.model, "tts-1");
        assert_eq!(tts.voice_id.as_deref(), Some("alloy"));
        assert_eq!(config.turn_settings().history_window, 10);
    }

    #[test]
    fn test_elevenlabs_tts_defaults_left_to_provider() {
        let config = ServerConfig {
            tts_provider: "ElevenLabs".to_string(),
            ..config_with_keys()
        };
        let tts = config.tts_config().unwrap();
        assert_eq!(tts.provider, "elevenlabs");
        assert_eq!(tts.api_key, "el");
        assert!(tts.model.is_empty());
        assert!(tts.voice_id.is_none());
    }

    #[test]
    fn test_default_system_prompt() {
        let llm = config_with_keys().llm_config().unwrap();
        assert_eq!(llm.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    #[serial]
    fn test_from_file_with_env_override() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
server:
  host: "127.0.0.1"
  port: 8080
providers:
  deepgram_api_key: "yaml-deepgram"
llm:
  model: "gpt-4o"
  history_window: 6
tts:
  provider: "elevenlabs"
session:
  required: true
"#,
        )
        .unwrap();

        unsafe {
            env::set_var("PORT", "9090");
            env::set_var("DEEPGRAM_API_KEY", "env-deepgram");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.deepgram_api_key.as_deref(), Some("env-deepgram"));
        assert_eq!(config.llm_model, "gpt-4o");
        assert_eq!(config.history_window, 6);
        assert_eq!(config.tts_provider, "elevenlabs");
        assert!(config.session_required);
        assert_eq!(config.session_ttl_seconds, 300);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_invalid_values() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "llm:\n  history_window: 1\n").unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    #[serial]
    fn test_from_file_missing() {
        cleanup_env_vars();
        let err = ServerConfig::from_file(&PathBuf::from("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
