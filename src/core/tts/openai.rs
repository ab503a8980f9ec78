use serde_json::json;

use super::base::{TTSConfig, TTSError, TTSResult};
use super::provider::SpeechRequestBuilder;

pub const OPENAI_TTS_URL: &str = "https://api.openai.com/v1";

/// OpenAI `/audio/speech` request builder
#[derive(Debug, Clone)]
pub struct OpenAISpeechBuilder {
    config: TTSConfig,
}

impl OpenAISpeechBuilder {
    pub fn new(config: TTSConfig) -> TTSResult<Self> {
        if config.api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "API key is required for OpenAI TTS".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn response_format(&self) -> &str {
        // OpenAI streams raw PCM as 24 kHz 16-bit mono under the name "pcm"
        if self.config.is_pcm() {
            "pcm"
        } else {
            self.config.audio_format.as_str()
        }
    }
}

impl SpeechRequestBuilder for OpenAISpeechBuilder {
    fn build_http_request(&self, client: &reqwest::Client, text: &str) -> reqwest::RequestBuilder {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_TTS_URL)
            .trim_end_matches('/');
        let body = json!({
            "model": self.config.model,
            "input": text,
            "voice": self.config.voice_id.as_deref().unwrap_or("alloy"),
            "response_format": self.response_format(),
        });

        client
            .post(format!("{base}/audio/speech"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
    }

    fn config(&self) -> &TTSConfig {
        &self.config
    }

    fn provider_info(&self) -> &'static str {
        "OpenAI TTS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tts::{HttpSynthesizer, SpeechSynthesizer};
    use crate::utils::req_manager::ReqManager;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_requires_api_key() {
        assert!(OpenAISpeechBuilder::new(TTSConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .and(header("authorization", "Bearer sk-tts"))
            .and(body_partial_json(serde_json::json!({
                "model": "tts-1",
                "voice": "alloy",
                "input": "Thanks for calling",
                "response_format": "mp3"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let builder = OpenAISpeechBuilder::new(TTSConfig {
            api_key: "sk-tts".to_string(),
            base_url: Some(format!("{}/v1", server.uri())),
            ..Default::default()
        })
        .unwrap();
        let tts = HttpSynthesizer::new(builder, Arc::new(ReqManager::new(1).unwrap()));

        let mut stream = tts.synthesize("Thanks for calling");
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.data.as_ref(), &[1u8, 2, 3]);
        assert!(chunk.is_final);
        assert!(stream.next().await.is_none());
    }
}
