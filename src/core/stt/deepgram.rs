use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{Instant, interval_at, timeout};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use url::Url;

use super::base::{
    STTConfig, STTError, SessionBackend, SessionCommand, SpeechEvent, SpeechRecognizer,
    SpeechSession,
};

/// Idle time after which a keep-alive frame is sent
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(8);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const KEEPALIVE_MESSAGE: &str = r#"{"type":"KeepAlive"}"#;
const CLOSE_STREAM_MESSAGE: &str = r#"{"type":"CloseStream"}"#;

type DeepgramStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Deepgram live message envelope
#[derive(Debug, Deserialize)]
pub struct DeepgramResponse {
    #[serde(rename = "type")]
    pub response_type: String,
    pub channel: Option<DeepgramChannel>,
    pub is_final: Option<bool>,
    pub speech_final: Option<bool>,
    pub description: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeepgramChannel {
    pub alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
pub struct DeepgramAlternative {
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

/// Map one provider text frame onto a normalized event.
///
/// Returns `Ok(None)` for frames that carry nothing the controller needs
/// (metadata, empty interim results).
pub fn parse_message(text: &str) -> Result<Option<SpeechEvent>, STTError> {
    let response: DeepgramResponse = serde_json::from_str(text)
        .map_err(|e| STTError::ProviderError(format!("Failed to parse response: {e}")))?;

    let event = match response.response_type.as_str() {
        "Results" => {
            let transcript = response
                .channel
                .and_then(|c| c.alternatives.into_iter().next())
                .map(|a| a.transcript.trim().to_string())
                .unwrap_or_default();
            if transcript.is_empty() {
                None
            } else {
                Some(SpeechEvent::Transcript {
                    text: transcript,
                    is_final: response.is_final.unwrap_or(false),
                })
            }
        }
        "SpeechStarted" => Some(SpeechEvent::ActivityDetected),
        "UtteranceEnd" => Some(SpeechEvent::UtteranceEnded),
        "Metadata" => {
            debug!("Received Deepgram metadata");
            None
        }
        "Error" => {
            let detail = response
                .description
                .or(response.message)
                .unwrap_or_else(|| "Unknown error from Deepgram".to_string());
            Some(SpeechEvent::Error(STTError::ProviderError(detail)))
        }
        other => {
            warn!("Unknown response type: {}", other);
            None
        }
    };
    Ok(event)
}

/// Deepgram live transcription over WebSocket
#[derive(Debug, Clone)]
pub struct DeepgramRecognizer {
    config: STTConfig,
}

impl DeepgramRecognizer {
    pub fn new(config: STTConfig) -> Result<Self, STTError> {
        if config.api_key.is_empty() {
            return Err(STTError::AuthenticationFailed(
                "API key is required for Deepgram".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Build the WebSocket URL with query parameters
    pub fn build_websocket_url(&self, sample_rate: u32, channels: u16) -> Result<Url, STTError> {
        let config = &self.config;
        let mut url = Url::parse(&config.base_url)
            .map_err(|e| STTError::ConfigurationError(format!("Invalid WebSocket URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("model", &config.model)
            .append_pair("language", &config.language)
            .append_pair("encoding", &config.encoding)
            .append_pair("sample_rate", &sample_rate.to_string())
            .append_pair("channels", &channels.to_string())
            .append_pair("punctuate", &config.punctuate.to_string())
            .append_pair("smart_format", &config.smart_format.to_string())
            .append_pair("interim_results", &config.interim_results.to_string())
            .append_pair("filler_words", &config.filler_words.to_string())
            .append_pair("vad_events", &config.vad_events.to_string())
            .append_pair("utterance_end_ms", &config.utterance_end_ms.to_string());

        Ok(url)
    }

    async fn connect(&self, url: Url) -> Result<DeepgramStream, STTError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| STTError::ConfigurationError(format!("Invalid request: {e}")))?;
        let auth = HeaderValue::from_str(&format!("Token {}", self.config.api_key))
            .map_err(|e| STTError::ConfigurationError(format!("Invalid API key: {e}")))?;
        request.headers_mut().insert("Authorization", auth);

        let (stream, _) = timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| STTError::ConnectionFailed("Connection timeout".to_string()))?
            .map_err(|e| match e {
                tungstenite::Error::Http(response) if response.status().as_u16() == 401 => {
                    STTError::AuthenticationFailed("Deepgram rejected the API key".to_string())
                }
                other => STTError::ConnectionFailed(other.to_string()),
            })?;
        Ok(stream)
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for DeepgramRecognizer {
    async fn start(&self, sample_rate: u32, channels: u16) -> Result<SpeechSession, STTError> {
        let url = self.build_websocket_url(sample_rate, channels)?;
        debug!("Connecting to Deepgram: {}", url.path());
        let stream = self.connect(url).await?;
        info!("Connected to Deepgram WebSocket");

        let (mut session, backend) = SpeechSession::channel();
        session.attach_task(tokio::spawn(run_connection(stream, backend)));
        Ok(session)
    }

    fn provider_info(&self) -> &'static str {
        "Deepgram live"
    }
}

/// Pump audio out and events in until stopped or the socket fails
async fn run_connection(stream: DeepgramStream, backend: SessionBackend) {
    let SessionBackend {
        mut commands,
        events,
    } = backend;
    let (mut ws_sink, mut ws_stream) = stream.split();
    let mut keepalive = interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);

    let _ = events.send(SpeechEvent::Opened);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SessionCommand::Audio(data)) => {
                    if let Err(e) = ws_sink.send(Message::Binary(data)).await {
                        error!("Failed to send audio to Deepgram: {}", e);
                        let _ = events.send(SpeechEvent::Error(STTError::NetworkError(e.to_string())));
                        break;
                    }
                    keepalive.reset();
                }
                Some(SessionCommand::Stop) | None => {
                    debug!("Closing Deepgram stream");
                    let _ = ws_sink.send(Message::Text(CLOSE_STREAM_MESSAGE.into())).await;
                    let _ = ws_sink.close().await;
                    break;
                }
            },

            _ = keepalive.tick() => {
                if let Err(e) = ws_sink.send(Message::Text(KEEPALIVE_MESSAGE.into())).await {
                    warn!("Failed to send keep-alive: {}", e);
                }
            }

            message = ws_stream.next() => match message {
                Some(Ok(Message::Text(text))) => match parse_message(&text) {
                    Ok(Some(event)) => {
                        let fatal = matches!(event, SpeechEvent::Error(_));
                        let _ = events.send(event);
                        if fatal {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Ignoring Deepgram frame: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("Deepgram closed the connection: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Deepgram WebSocket error: {}", e);
                    let _ = events.send(SpeechEvent::Error(STTError::NetworkError(e.to_string())));
                    break;
                }
                None => {
                    info!("Deepgram stream ended");
                    break;
                }
            },
        }
    }

    let _ = events.send(SpeechEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn test_config(base_url: &str) -> STTConfig {
        STTConfig {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_api_key() {
        let result = DeepgramRecognizer::new(STTConfig::default());
        assert!(matches!(result, Err(STTError::AuthenticationFailed(_))));
    }

    #[test]
    fn test_url_carries_stream_options() {
        let recognizer =
            DeepgramRecognizer::new(test_config("wss://api.deepgram.com/v1/listen")).unwrap();
        let url = recognizer.build_websocket_url(24000, 1).unwrap();
        let query = url.query().unwrap();

        assert!(query.contains("model=nova-2"));
        assert!(query.contains("language=en-US"));
        assert!(query.contains("encoding=linear16"));
        assert!(query.contains("sample_rate=24000"));
        assert!(query.contains("channels=1"));
        assert!(query.contains("interim_results=true"));
        assert!(query.contains("utterance_end_ms=1200"));
        assert!(query.contains("vad_events=true"));
        assert!(query.contains("filler_words=false"));
    }

    #[test]
    fn test_parse_results() {
        let frame = r#"{"type":"Results","is_final":true,"speech_final":false,
            "channel":{"alternatives":[{"transcript":"I need an appointment","confidence":0.98}]}}"#;
        assert_eq!(
            parse_message(frame).unwrap(),
            Some(SpeechEvent::Transcript {
                text: "I need an appointment".to_string(),
                is_final: true
            })
        );
    }

    #[test]
    fn test_parse_empty_results_is_dropped() {
        let frame = r#"{"type":"Results","is_final":false,
            "channel":{"alternatives":[{"transcript":"  ","confidence":0.0}]}}"#;
        assert_eq!(parse_message(frame).unwrap(), None);
    }

    #[test]
    fn test_parse_vad_and_utterance_events() {
        assert_eq!(
            parse_message(r#"{"type":"SpeechStarted","timestamp":1.2}"#).unwrap(),
            Some(SpeechEvent::ActivityDetected)
        );
        assert_eq!(
            parse_message(r#"{"type":"UtteranceEnd","last_word_end":2.0}"#).unwrap(),
            Some(SpeechEvent::UtteranceEnded)
        );
        assert_eq!(
            parse_message(r#"{"type":"Metadata","request_id":"abc"}"#).unwrap(),
            None
        );
    }

    #[test]
    fn test_parse_error_frame() {
        let event = parse_message(r#"{"type":"Error","description":"bad audio"}"#).unwrap();
        assert_eq!(
            event,
            Some(SpeechEvent::Error(STTError::ProviderError(
                "bad audio".to_string()
            )))
        );
        assert!(parse_message("{not json").is_err());
    }

    #[tokio::test]
    async fn test_live_session_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();

            // First frame is caller audio
            let audio = ws.next().await.unwrap().unwrap();
            assert!(audio.is_binary());

            ws.send(Message::Text(
                r#"{"type":"Results","is_final":true,"channel":{"alternatives":[{"transcript":"hello"}]}}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(r#"{"type":"UtteranceEnd"}"#.into()))
                .await
                .unwrap();

            // Then the close request
            let close = ws.next().await.unwrap().unwrap();
            assert_eq!(close.to_text().unwrap(), CLOSE_STREAM_MESSAGE);
        });

        let recognizer = DeepgramRecognizer::new(test_config(&format!("ws://{addr}"))).unwrap();
        let mut session = recognizer.start(16000, 1).await.unwrap();

        assert_eq!(session.next_event().await, Some(SpeechEvent::Opened));
        assert!(session.feed(Bytes::from_static(&[0, 0, 1, 0])));
        assert_eq!(
            session.next_event().await,
            Some(SpeechEvent::Transcript {
                text: "hello".to_string(),
                is_final: true
            })
        );
        assert_eq!(session.next_event().await, Some(SpeechEvent::UtteranceEnded));

        session.stop();
        assert_eq!(session.next_event().await, Some(SpeechEvent::Closed));
        server.await.unwrap();
    }
}
