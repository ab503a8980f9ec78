use std::sync::Arc;

use tracing::{error, info};

use crate::config::{ConfigError, ServerConfig};
use crate::core::llm::{OpenAIChatModel, ReceptionTools, ToolLoopGenerator};
use crate::core::stt::DeepgramRecognizer;
use crate::core::tts::create_synthesizer;
use crate::core::turn::CallBackends;
use crate::utils::req_manager::{ReqManager, ReqManagerConfig};

/// Builds the backends for a new call.
///
/// Returning an error here is fatal for that call only: the caller gets one
/// `error` message and the channel closes.
pub trait BackendProvider: Send + Sync {
    fn backends(&self) -> Result<CallBackends, ConfigError>;
}

/// Deepgram recognition, OpenAI-compatible replies with the reception tools,
/// and the configured synthesis provider.
pub struct ConfiguredBackends {
    config: ServerConfig,
    http: Arc<ReqManager>,
}

impl ConfiguredBackends {
    pub fn new(config: ServerConfig, http: Arc<ReqManager>) -> Self {
        Self { config, http }
    }
}

impl BackendProvider for ConfiguredBackends {
    fn backends(&self) -> Result<CallBackends, ConfigError> {
        // Key checks first so the caller sees the missing key by name
        let stt_config = self.config.stt_config()?;
        let llm_config = self.config.llm_config()?;
        let tts_config = self.config.tts_config()?;

        let recognizer = DeepgramRecognizer::new(stt_config)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        let model = OpenAIChatModel::new(llm_config.clone(), self.http.clone())
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        let generator =
            ToolLoopGenerator::from_config(&llm_config, Arc::new(model), Arc::new(ReceptionTools));
        let synthesizer = create_synthesizer(tts_config, self.http.clone())
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(CallBackends {
            recognizer: Arc::new(recognizer),
            generator: Arc::new(generator),
            synthesizer,
        })
    }
}

/// Core-specific shared state for the application.
///
/// Holds resources shared by every call: the HTTP connection pool used by
/// reply generation and synthesis, and the factory that wires per-call backends.
#[derive(Clone)]
pub struct CoreState {
    /// Shared HTTP client pool for LLM and TTS requests
    pub http: Arc<ReqManager>,
    pub backends: Arc<dyn BackendProvider>,
}

impl CoreState {
    /// Initialize core state with the configured providers.
    pub fn new(config: &ServerConfig) -> Result<Arc<Self>, ConfigError> {
        let http = match ReqManager::with_config(ReqManagerConfig::default()) {
            Ok(manager) => Arc::new(manager),
            Err(e) => {
                error!("Failed to create HTTP request manager: {}", e);
                return Err(ConfigError::Validation(e.to_string()));
            }
        };
        info!(
            "Initialized ReqManager with {} concurrent connections",
            http.max_concurrent()
        );

        let backends = Arc::new(ConfiguredBackends::new(config.clone(), http.clone()));
        Ok(Arc::new(Self { http, backends }))
    }

    /// Core state with a custom backend factory
    pub fn with_backends(http: Arc<ReqManager>, backends: Arc<dyn BackendProvider>) -> Arc<Self> {
        Arc::new(Self { http, backends })
    }

    pub fn call_backends(&self) -> Result<CallBackends, ConfigError> {
        self.backends.backends()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            deepgram_api_key: Some("dg".to_string()),
            openai_api_key: Some("oa".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_configured_backends() {
        let state = CoreState::new(&config()).unwrap();
        let backends = state.call_backends().unwrap();
        assert_eq!(backends.recognizer.provider_info(), "Deepgram live");
        assert_eq!(backends.synthesizer.provider_info(), "OpenAI TTS");
    }

    #[tokio::test]
    async fn test_missing_keys_fail_per_call() {
        for (config, missing) in [
            (
                ServerConfig {
                    deepgram_api_key: None,
                    ..config()
                },
                "Deepgram",
            ),
            (
                ServerConfig {
                    openai_api_key: None,
                    ..config()
                },
                "OpenAI",
            ),
            (
                ServerConfig {
                    tts_provider: "elevenlabs".to_string(),
                    ..config()
                },
                "ElevenLabs",
            ),
        ] {
            let state = CoreState::new(&config).unwrap();
            let err = state.call_backends().err().expect("backends should fail");
            assert_eq!(
                err.to_string(),
                format!("Server configuration error: Missing {missing} API key")
            );
        }
    }
}
