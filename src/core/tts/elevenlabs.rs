use serde::{Deserialize, Serialize};
use serde_json::json;

use super::base::{TTSConfig, TTSError, TTSResult};
use super::provider::SpeechRequestBuilder;

/// Voice settings for ElevenLabs TTS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Voice stability (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<f32>,
    /// Similarity boost (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_boost: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_speaker_boost: Option<bool>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: Some(0.5),
            similarity_boost: Some(0.8),
            use_speaker_boost: Some(false),
        }
    }
}

pub const ELEVENLABS_TTS_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const DEFAULT_MODEL_ID: &str = "eleven_turbo_v2_5";

/// ElevenLabs streaming request builder
#[derive(Debug, Clone)]
pub struct ElevenLabsSpeechBuilder {
    config: TTSConfig,
    voice_settings: VoiceSettings,
}

impl ElevenLabsSpeechBuilder {
    pub fn new(config: TTSConfig) -> TTSResult<Self> {
        if config.api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "API key is required for ElevenLabs".to_string(),
            ));
        }
        Ok(Self {
            config,
            voice_settings: VoiceSettings::default(),
        })
    }

    /// ElevenLabs `output_format` for the configured encoding
    pub fn output_format(&self) -> String {
        if self.config.is_pcm() {
            match self.config.sample_rate {
                16000 => "pcm_16000",
                22050 => "pcm_22050",
                44100 => "pcm_44100",
                _ => "pcm_24000",
            }
            .to_string()
        } else if self.config.audio_format == "ulaw" {
            "ulaw_8000".to_string()
        } else {
            "mp3_44100_128".to_string()
        }
    }
}

impl SpeechRequestBuilder for ElevenLabsSpeechBuilder {
    fn build_http_request(&self, client: &reqwest::Client, text: &str) -> reqwest::RequestBuilder {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(ELEVENLABS_TTS_URL)
            .trim_end_matches('/');
        let voice_id = self.config.voice_id.as_deref().unwrap_or(DEFAULT_VOICE_ID);
        let model_id = if self.config.model.is_empty() {
            DEFAULT_MODEL_ID
        } else {
            self.config.model.as_str()
        };
        let output_format = self.output_format();

        let accept = if output_format.starts_with("pcm") {
            "audio/pcm"
        } else if output_format.starts_with("ulaw") {
            "audio/basic"
        } else {
            "audio/mpeg"
        };

        client
            .post(format!("{base}/v1/text-to-speech/{voice_id}/stream"))
            .query(&[("output_format", output_format.as_str())])
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", accept)
            .json(&json!({
                "text": text,
                "model_id": model_id,
                "voice_settings": self.voice_settings,
            }))
    }

    fn config(&self) -> &TTSConfig {
        &self.config
    }

    fn provider_info(&self) -> &'static str {
        "ElevenLabs TTS"
    }
}
