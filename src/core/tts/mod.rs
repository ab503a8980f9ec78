pub mod base;
pub mod elevenlabs;
pub mod openai;
pub mod provider;

use std::sync::Arc;

pub use base::{AudioStream, SpeechSynthesizer, TTSConfig, TTSError, TTSResult};
pub use elevenlabs::{ELEVENLABS_TTS_URL, ElevenLabsSpeechBuilder};
pub use openai::{OPENAI_TTS_URL, OpenAISpeechBuilder};
pub use provider::{FinalChunkMarker, HttpSynthesizer, SpeechRequestBuilder};

use crate::utils::req_manager::ReqManager;

/// Providers accepted by [`create_synthesizer`]
pub const SUPPORTED_TTS_PROVIDERS: &[&str] = &["openai", "elevenlabs"];

/// Factory function to create a synthesizer.
///
/// # Supported Providers
///
/// - `"openai"` - OpenAI `/v1/audio/speech`
/// - `"elevenlabs"` - ElevenLabs streaming endpoint
pub fn create_synthesizer(
    config: TTSConfig,
    http: Arc<ReqManager>,
) -> TTSResult<Arc<dyn SpeechSynthesizer>> {
    match config.provider.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(HttpSynthesizer::new(
            OpenAISpeechBuilder::new(config)?,
            http,
        ))),
        "elevenlabs" => Ok(Arc::new(HttpSynthesizer::new(
            ElevenLabsSpeechBuilder::new(config)?,
            http,
        ))),
        other => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported TTS provider: {other}. Supported providers: {}",
            SUPPORTED_TTS_PROVIDERS.join(", ")
        ))),
    }
}
