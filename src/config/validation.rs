use super::{ConfigError, ServerConfig};
use crate::core::tts::SUPPORTED_TTS_PROVIDERS;

/// Smallest history window that still holds one user/assistant exchange
pub const MIN_HISTORY_WINDOW: usize = 2;

/// Validate a merged configuration
///
/// Checks value ranges only. Provider keys may be absent; each call
/// reports a missing key when it starts.
pub fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_history_window(config.history_window)?;
    validate_tool_loop(config.max_tool_iterations, config.tool_timeout_seconds)?;
    validate_tts_provider(&config.tts_provider)?;
    validate_llm(config.llm_temperature, config.llm_max_tokens)?;

    if config.stt_sample_rate == 0 {
        return Err(ConfigError::Validation(
            "STT_SAMPLE_RATE must be greater than 0".to_string(),
        ));
    }
    if config.session_ttl_seconds == 0 {
        return Err(ConfigError::Validation(
            "SESSION_TTL_SECONDS must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_history_window(window: usize) -> Result<(), ConfigError> {
    if window < MIN_HISTORY_WINDOW {
        return Err(ConfigError::Validation(format!(
            "HISTORY_WINDOW must be at least {MIN_HISTORY_WINDOW}, got {window}"
        )));
    }
    Ok(())
}

pub fn validate_tool_loop(max_iterations: u32, timeout_seconds: u64) -> Result<(), ConfigError> {
    if max_iterations == 0 {
        return Err(ConfigError::Validation(
            "MAX_TOOL_ITERATIONS must be at least 1".to_string(),
        ));
    }
    if timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "TOOL_TIMEOUT_SECONDS must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_tts_provider(provider: &str) -> Result<(), ConfigError> {
    let provider = provider.to_lowercase();
    if !SUPPORTED_TTS_PROVIDERS.contains(&provider.as_str()) {
        return Err(ConfigError::Validation(format!(
            "Unsupported TTS_PROVIDER '{provider}'. Supported providers: {}",
            SUPPORTED_TTS_PROVIDERS.join(", ")
        )));
    }
    Ok(())
}

pub fn validate_llm(temperature: f32, max_tokens: u32) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::Validation(format!(
            "LLM_TEMPERATURE must be between 0 and 2, got {temperature}"
        )));
    }
    if max_tokens == 0 {
        return Err(ConfigError::Validation(
            "LLM_MAX_TOKENS must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
