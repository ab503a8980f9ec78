use super::utils::{env_bool, env_parse, env_string};
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig};

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. Environment variables
/// 2. YAML configuration values
/// 3. Default values
///
/// Unset or empty environment variables fall through to YAML. A set but
/// malformed numeric or boolean variable is an error.
pub fn merge_config(yaml_config: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let yaml = yaml_config.unwrap_or_default();
    let defaults = ServerConfig::default();

    let server = yaml.server.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let stt = yaml.stt.unwrap_or_default();
    let llm = yaml.llm.unwrap_or_default();
    let tts = yaml.tts.unwrap_or_default();
    let session = yaml.session.unwrap_or_default();

    // Helper macro for string values: ENV > YAML > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            env_string($env_var).or($yaml_value).unwrap_or($default)
        };
    }

    // Helper macro for optional strings: ENV > YAML
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            env_string($env_var).or($yaml_value)
        };
    }

    // Helper macro for parsed values: ENV > YAML > Default
    macro_rules! get_parsed {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            env_parse($env_var)?.or($yaml_value).unwrap_or($default)
        };
    }

    Ok(ServerConfig {
        host: get_value!("HOST", server.host, defaults.host),
        port: get_parsed!("PORT", server.port, defaults.port),

        deepgram_api_key: get_optional!("DEEPGRAM_API_KEY", providers.deepgram_api_key),
        openai_api_key: get_optional!("OPENAI_API_KEY", providers.openai_api_key),
        elevenlabs_api_key: get_optional!("ELEVENLABS_API_KEY", providers.elevenlabs_api_key),
        openai_base_url: get_value!(
            "OPENAI_BASE_URL",
            providers.openai_base_url,
            defaults.openai_base_url
        ),

        stt_model: get_value!("STT_MODEL", stt.model, defaults.stt_model),
        stt_language: get_value!("STT_LANGUAGE", stt.language, defaults.stt_language),
        stt_sample_rate: get_parsed!("STT_SAMPLE_RATE", stt.sample_rate, defaults.stt_sample_rate),
        utterance_end_ms: get_parsed!(
            "UTTERANCE_END_MS",
            stt.utterance_end_ms,
            defaults.utterance_end_ms
        ),

        llm_model: get_value!("LLM_MODEL", llm.model, defaults.llm_model),
        llm_temperature: get_parsed!("LLM_TEMPERATURE", llm.temperature, defaults.llm_temperature),
        llm_max_tokens: get_parsed!("LLM_MAX_TOKENS", llm.max_tokens, defaults.llm_max_tokens),
        system_prompt: get_optional!("SYSTEM_PROMPT", llm.system_prompt),
        max_tool_iterations: get_parsed!(
            "MAX_TOOL_ITERATIONS",
            llm.max_tool_iterations,
            defaults.max_tool_iterations
        ),
        tool_timeout_seconds: get_parsed!(
            "TOOL_TIMEOUT_SECONDS",
            llm.tool_timeout_seconds,
            defaults.tool_timeout_seconds
        ),
        history_window: get_parsed!("HISTORY_WINDOW", llm.history_window, defaults.history_window),

        tts_provider: get_value!("TTS_PROVIDER", tts.provider, defaults.tts_provider),
        tts_model: get_optional!("TTS_MODEL", tts.model),
        tts_voice: get_optional!("TTS_VOICE", tts.voice),
        tts_format: get_value!("TTS_FORMAT", tts.format, defaults.tts_format),

        session_required: env_bool("SESSION_REQUIRED")?
            .or(session.required)
            .unwrap_or(defaults.session_required),
        session_ttl_seconds: get_parsed!(
            "SESSION_TTL_SECONDS",
            session.ttl_seconds,
            defaults.session_ttl_seconds
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::yaml::{LlmYaml, ProvidersYaml, ServerYaml, SessionYaml, TtsYaml};
    use serial_test::serial;
    use std::env;

    fn cleanup() {
        for key in [
            "HOST",
            "PORT",
            "OPENAI_API_KEY",
            "LLM_MODEL",
            "LLM_TEMPERATURE",
            "TTS_PROVIDER",
            "TTS_VOICE",
            "SESSION_REQUIRED",
            "HISTORY_WINDOW",
        ] {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    fn yaml() -> YamlConfig {
        YamlConfig {
            server: Some(ServerYaml {
                host: Some("10.0.0.1".to_string()),
                port: Some(4000),
            }),
            providers: Some(ProvidersYaml {
                openai_api_key: Some("yaml-openai".to_string()),
                ..Default::default()
            }),
            llm: Some(LlmYaml {
                model: Some("yaml-model".to_string()),
                history_window: Some(8),
                ..Default::default()
            }),
            tts: Some(TtsYaml {
                provider: Some("elevenlabs".to_string()),
                voice: Some("yaml-voice".to_string()),
                ..Default::default()
            }),
            session: Some(SessionYaml {
                required: Some(true),
                ttl_seconds: Some(120),
            }),
            ..Default::default()
        }
    }

    #[test]
    #[serial]
    fn test_merge_defaults_only() {
        cleanup();
        let config = merge_config(None).unwrap();
        let defaults = ServerConfig::default();
        assert_eq!(config.host, defaults.host);
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.llm_model, "gpt-4o-mini");
        assert_eq!(config.tts_provider, "openai");
        assert!(!config.session_required);
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_merge_yaml_over_defaults() {
        cleanup();
        let config = merge_config(Some(yaml())).unwrap();
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.openai_api_key.as_deref(), Some("yaml-openai"));
        assert_eq!(config.llm_model, "yaml-model");
        assert_eq!(config.history_window, 8);
        assert_eq!(config.tts_voice.as_deref(), Some("yaml-voice"));
        assert!(config.session_required);
        assert_eq!(config.session_ttl_seconds, 120);
        // Untouched sections keep their defaults
        assert_eq!(config.stt_model, "nova-2");
    }

    #[test]
    #[serial]
    fn test_merge_env_over_yaml() {
        cleanup();
        unsafe {
            env::set_var("HOST", "127.0.0.1");
            env::set_var("OPENAI_API_KEY", "env-openai");
            env::set_var("LLM_TEMPERATURE", "0.3");
            env::set_var("SESSION_REQUIRED", "no");
            env::set_var("TTS_VOICE", "");
        }

        let config = merge_config(Some(yaml())).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.openai_api_key.as_deref(), Some("env-openai"));
        assert_eq!(config.llm_temperature, 0.3);
        assert!(!config.session_required);
        // Empty env values fall through to YAML
        assert_eq!(config.tts_voice.as_deref(), Some("yaml-voice"));

        cleanup();
    }

    #[test]
    #[serial]
    fn test_merge_invalid_env_value() {
        cleanup();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }
        let err = merge_config(Some(yaml())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));

        unsafe {
            env::set_var("PORT", "3000");
            env::set_var("SESSION_REQUIRED", "sometimes");
        }
        let err = merge_config(None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "SESSION_REQUIRED",
                ..
            }
        ));
        cleanup();
    }
}
