use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::audio::{DEFAULT_SAMPLE_RATE, WIRE_ENCODING};

/// Configuration for the live recognition backend
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct STTConfig {
    /// API key for the recognition provider
    pub api_key: String,
    /// Model to use for transcription
    pub model: String,
    /// Language code for transcription (e.g., "en-US")
    pub language: String,
    /// Default sample rate when the caller does not announce one
    pub sample_rate: u32,
    /// Default channel count when the caller does not announce one
    pub channels: u16,
    /// Encoding of the inbound audio
    pub encoding: String,
    pub punctuate: bool,
    pub smart_format: bool,
    pub interim_results: bool,
    pub filler_words: bool,
    pub vad_events: bool,
    /// Silence gap after which the provider reports the end of an utterance
    pub utterance_end_ms: u32,
    /// WebSocket endpoint, overridable for tests
    pub base_url: String,
}

impl Default for STTConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "nova-2".to_string(),
            language: "en-US".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            encoding: WIRE_ENCODING.to_string(),
            punctuate: true,
            smart_format: true,
            interim_results: true,
            filler_words: false,
            vad_events: true,
            utterance_end_ms: 1200,
            base_url: "wss://api.deepgram.com/v1/listen".to_string(),
        }
    }
}

/// Error types for STT operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum STTError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Normalized recognition events, independent of the provider's wire format
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// Backend connection is live and accepting audio
    Opened,
    /// Voice activity without any recognized words yet
    ActivityDetected,
    /// Recognized text; never empty
    Transcript { text: String, is_final: bool },
    /// Silence gap closed the current utterance
    UtteranceEnded,
    Error(STTError),
    Closed,
}

/// Commands flowing from a session handle into its backend task
#[derive(Debug)]
pub enum SessionCommand {
    Audio(Bytes),
    Stop,
}

/// Backend half of a [`SpeechSession`]
pub struct SessionBackend {
    pub commands: mpsc::UnboundedReceiver<SessionCommand>,
    pub events: mpsc::UnboundedSender<SpeechEvent>,
}

/// One live recognition session, owned by the call's turn controller.
pub struct SpeechSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: mpsc::UnboundedReceiver<SpeechEvent>,
    task: Option<JoinHandle<()>>,
    stopped: bool,
}

impl SpeechSession {
    /// Create a session handle together with the half a backend drives.
    pub fn channel() -> (Self, SessionBackend) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                commands: commands_tx,
                events: events_rx,
                task: None,
                stopped: false,
            },
            SessionBackend {
                commands: commands_rx,
                events: events_tx,
            },
        )
    }

    /// Tie the backend task's lifetime to this handle.
    pub fn attach_task(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    /// Queue audio for the backend. Never waits on the provider.
    ///
    /// Returns false once the backend has gone away.
    pub fn feed(&self, audio: Bytes) -> bool {
        if self.stopped {
            return false;
        }
        self.commands.send(SessionCommand::Audio(audio)).is_ok()
    }

    /// Ask the backend to flush and close. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if self.commands.send(SessionCommand::Stop).is_err() {
            debug!("Recognition backend already gone at stop");
        }
    }

    /// Next normalized event, `None` once the backend task has exited.
    pub async fn next_event(&mut self) -> Option<SpeechEvent> {
        self.events.recv().await
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Drop for SpeechSession {
    fn drop(&mut self) {
        self.stop();
        // The backend task exits on its own once it has sent the close frame
        drop(self.task.take());
    }
}

/// Opens live recognition sessions against a provider
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Open a session for audio in the given format.
    async fn start(&self, sample_rate: u32, channels: u16) -> Result<SpeechSession, STTError>;

    /// Get provider-specific information
    fn provider_info(&self) -> &'static str;
}
