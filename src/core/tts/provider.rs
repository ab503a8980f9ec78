use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tracing::{debug, error, info};

use super::base::{AudioStream, SpeechSynthesizer, TTSConfig, TTSError, TTSResult};
use crate::core::audio::{AudioChunk, BYTES_PER_SAMPLE};
use crate::core::stream::{CancellableStream, StreamSink};
use crate::utils::req_manager::ReqManager;

/// PCM is regrouped into frames of this length
pub const PCM_CHUNK_MS: usize = 100;

/// Provider-specific part of an HTTP synthesis request
pub trait SpeechRequestBuilder: Send + Sync + 'static {
    /// Build the provider's URL, headers and body for `text`
    fn build_http_request(&self, client: &reqwest::Client, text: &str) -> reqwest::RequestBuilder;

    fn config(&self) -> &TTSConfig;

    fn provider_info(&self) -> &'static str;
}

/// Bytes per re-chunked frame, or 0 when the body is forwarded as received
pub fn chunk_target_bytes(config: &TTSConfig) -> usize {
    if !config.is_pcm() {
        return 0;
    }
    let rate = config.sample_rate.max(1000) as usize;
    rate * PCM_CHUNK_MS / 1000 * BYTES_PER_SAMPLE
}

/// Numbers chunks and holds the latest one back so the last can be marked final
#[derive(Debug, Default)]
pub struct FinalChunkMarker {
    pending: Option<Bytes>,
    next_sequence: u64,
}

impl FinalChunkMarker {
    /// Queue `data`, releasing the previously held chunk
    pub fn push(&mut self, data: Bytes) -> Option<AudioChunk> {
        if data.is_empty() {
            return None;
        }
        let previous = self.pending.replace(data)?;
        Some(self.emit(previous, false))
    }

    /// Release the held chunk as the final one
    pub fn finish(&mut self) -> Option<AudioChunk> {
        let last = self.pending.take()?;
        Some(self.emit(last, true))
    }

    fn emit(&mut self, data: Bytes, is_final: bool) -> AudioChunk {
        let chunk = AudioChunk::new(data, self.next_sequence, is_final);
        self.next_sequence += 1;
        chunk
    }
}

/// Generic HTTP streaming synthesizer over the shared request pool
pub struct HttpSynthesizer<R: SpeechRequestBuilder> {
    builder: Arc<R>,
    http: Arc<ReqManager>,
}

impl<R: SpeechRequestBuilder> HttpSynthesizer<R> {
    pub fn new(builder: R, http: Arc<ReqManager>) -> Self {
        Self {
            builder: Arc::new(builder),
            http,
        }
    }
}

impl<R: SpeechRequestBuilder> SpeechSynthesizer for HttpSynthesizer<R> {
    fn synthesize(&self, text: &str) -> AudioStream {
        let builder = self.builder.clone();
        let http = self.http.clone();
        let text = text.to_string();
        CancellableStream::spawn(move |sink| async move {
            stream_speech(builder, http, text, sink).await;
        })
    }

    fn provider_info(&self) -> &'static str {
        self.builder.provider_info()
    }
}

async fn stream_speech<R: SpeechRequestBuilder>(
    builder: Arc<R>,
    http: Arc<ReqManager>,
    text: String,
    sink: StreamSink<TTSResult<AudioChunk>>,
) {
    let guard = match http.acquire().await {
        Ok(guard) => guard,
        Err(e) => {
            error!("Failed to acquire HTTP client: {}", e);
            sink.send(Err(TTSError::NetworkError(format!(
                "Failed to acquire client: {e}"
            ))))
            .await;
            return;
        }
    };

    let result = builder
        .build_http_request(guard.client(), &text)
        .send()
        .await;
    guard.record(&result);

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            error!("HTTP request failed: {}", e);
            sink.send(Err(TTSError::NetworkError(format!("Request failed: {e}"))))
                .await;
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!("TTS API error ({}): {}", status, error_body);
        sink.send(Err(TTSError::ProviderError(format!(
            "API error ({status}): {error_body}"
        ))))
        .await;
        return;
    }

    let target = chunk_target_bytes(builder.config());
    let mut buffer = BytesMut::with_capacity(target.max(512));
    let mut marker = FinalChunkMarker::default();
    let mut body = response.bytes_stream();

    while let Some(item) = body.next().await {
        if sink.is_cancelled() {
            debug!("Synthesis cancelled mid-stream");
            return;
        }

        let bytes = match item {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to read audio chunk: {}", e);
                if let Some(partial) = marker.pending.take() {
                    let chunk = marker.emit(partial, false);
                    if !sink.send(Ok(chunk)).await {
                        return;
                    }
                }
                sink.send(Err(TTSError::AudioGenerationFailed(format!(
                    "Failed to read audio: {e}"
                ))))
                .await;
                return;
            }
        };

        if target == 0 {
            // Compressed formats: forward as received
            if let Some(chunk) = marker.push(bytes)
                && !sink.send(Ok(chunk)).await
            {
                return;
            }
            continue;
        }

        buffer.extend_from_slice(&bytes);
        while buffer.len() >= target {
            let frame = buffer.split_to(target).freeze();
            if let Some(chunk) = marker.push(frame)
                && !sink.send(Ok(chunk)).await
            {
                return;
            }
        }
    }

    if !buffer.is_empty()
        && let Some(chunk) = marker.push(buffer.freeze())
        && !sink.send(Ok(chunk)).await
    {
        return;
    }

    if let Some(last) = marker.finish() {
        info!("Synthesis complete after {} chunks", last.sequence + 1);
        sink.send(Ok(last)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::ChunkAssembler;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct EchoBuilder {
        config: TTSConfig,
        url: String,
    }

    impl SpeechRequestBuilder for EchoBuilder {
        fn build_http_request(
            &self,
            client: &reqwest::Client,
            text: &str,
        ) -> reqwest::RequestBuilder {
            client.post(&self.url).body(text.to_string())
        }

        fn config(&self) -> &TTSConfig {
            &self.config
        }

        fn provider_info(&self) -> &'static str {
            "echo"
        }
    }

    async fn synthesizer(server: &MockServer, format: &str) -> HttpSynthesizer<EchoBuilder> {
        let builder = EchoBuilder {
            config: TTSConfig {
                audio_format: format.to_string(),
                sample_rate: 16000,
                ..Default::default()
            },
            url: format!("{}/speak", server.uri()),
        };
        HttpSynthesizer::new(builder, Arc::new(ReqManager::new(2).unwrap()))
    }

    async fn drain(mut stream: AudioStream) -> Vec<TTSResult<AudioChunk>> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_chunk_target_bytes() {
        let pcm = TTSConfig {
            audio_format: "pcm".to_string(),
            sample_rate: 24000,
            ..Default::default()
        };
        assert_eq!(chunk_target_bytes(&pcm), 4800);
        assert_eq!(chunk_target_bytes(&TTSConfig::default()), 0);
    }

    #[test]
    fn test_marker_flags_last_chunk() {
        let mut marker = FinalChunkMarker::default();
        assert!(marker.push(Bytes::from_static(b"a")).is_none());
        let first = marker.push(Bytes::from_static(b"b")).unwrap();
        assert_eq!((first.sequence, first.is_final), (0, false));
        assert!(marker.push(Bytes::new()).is_none());
        let last = marker.finish().unwrap();
        assert_eq!((last.sequence, last.is_final), (1, true));
        assert!(marker.finish().is_none());
    }

    #[tokio::test]
    async fn test_pcm_body_is_rechunked_and_sequenced() {
        let server = MockServer::start().await;
        // 16 kHz PCM16: 3200 bytes per 100 ms frame
        let body = vec![7u8; 3200 * 2 + 100];
        Mock::given(method("POST"))
            .and(path("/speak"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let tts = synthesizer(&server, "pcm").await;
        let chunks: Vec<AudioChunk> = drain(tts.synthesize("Hello"))
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].data.len(), 3200);
        assert_eq!(chunks[2].data.len(), 100);
        assert!(chunks[2].is_final);
        assert!(!chunks[0].is_final && !chunks[1].is_final);

        let mut assembler = ChunkAssembler::default();
        for chunk in &chunks {
            assembler.push(chunk).unwrap();
        }
        assert!(assembler.is_complete());
        assert_eq!(assembler.into_bytes().as_ref(), body.as_slice());
    }

    #[tokio::test]
    async fn test_compressed_body_ends_with_final_chunk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speak"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFFu8; 64]))
            .mount(&server)
            .await;

        let tts = synthesizer(&server, "mp3").await;
        let chunks = drain(tts.synthesize("Hi")).await;
        let last = chunks.last().unwrap().as_ref().unwrap();
        assert!(last.is_final);
        assert_eq!(chunks[0].as_ref().unwrap().sequence, 0);
    }

    #[tokio::test]
    async fn test_provider_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speak"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let tts = synthesizer(&server, "mp3").await;
        let items = drain(tts.synthesize("Hi")).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(TTSError::ProviderError(m)) if m.contains("overloaded")));
    }
}
