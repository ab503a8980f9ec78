//! Shared types for streaming speech synthesis.

use crate::core::audio::AudioChunk;
use crate::core::stream::CancellableStream;

/// TTS-specific error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TTSError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Result type for TTS operations
pub type TTSResult<T> = Result<T, TTSError>;

/// Configuration for TTS providers
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct TTSConfig {
    /// `openai` or `elevenlabs`
    pub provider: String,
    pub api_key: String,
    /// Voice ID or name to use for synthesis
    pub voice_id: Option<String>,
    pub model: String,
    /// `mp3` is forwarded as received; `pcm`/`linear16` is re-chunked
    pub audio_format: String,
    /// Sample rate of PCM output
    pub sample_rate: u32,
    /// API root override, mainly for tests
    pub base_url: Option<String>,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            voice_id: Some("alloy".to_string()),
            model: "tts-1".to_string(),
            audio_format: "mp3".to_string(),
            sample_rate: 24000,
            base_url: None,
        }
    }
}

impl TTSConfig {
    pub fn is_pcm(&self) -> bool {
        matches!(self.audio_format.as_str(), "pcm" | "linear16")
    }
}

/// Sequenced audio for one reply; cancel to stop synthesis
pub type AudioStream = CancellableStream<TTSResult<AudioChunk>>;

/// Turns reply text into a stream of audio chunks.
///
/// Sequence numbers start at 0 for every call and the last chunk carries
/// `is_final`.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> AudioStream;

    fn provider_info(&self) -> &'static str;
}
