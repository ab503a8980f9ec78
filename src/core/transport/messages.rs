//! Wire messages exchanged over the duplex channel
//!
//! Binary frames carry raw caller audio (PCM16 mono). Everything else is a
//! JSON object tagged by `type`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Control messages sent by the caller
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Open a recognition session. Audio format fields fall back to server config.
    #[serde(rename = "start")]
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sample_rate: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channels: Option<u16>,
    },
    #[serde(rename = "stop")]
    Stop,
    /// Playback position at the moment the caller cut the assistant off.
    ///
    /// Browsers report `NaN` durations as `null`, hence the options.
    #[serde(rename = "user_interrupted")]
    UserInterrupted {
        #[serde(rename = "interruptedAt", default)]
        interrupted_at: Option<f64>,
        #[serde(rename = "totalDuration", default)]
        total_duration: Option<f64>,
        #[serde(rename = "fullText", default)]
        full_text: String,
    },
}

/// Control and event messages sent to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "status")]
    Status { message: String },
    #[serde(rename = "speech_started")]
    SpeechStarted,
    #[serde(rename = "utterance_end")]
    UtteranceEnd { transcript: String },
    #[serde(rename = "ai_response_start")]
    AiResponseStart,
    #[serde(rename = "ai_response_chunk")]
    AiResponseChunk { text: String },
    #[serde(rename = "ai_response_end")]
    AiResponseEnd,
    #[serde(rename = "audio_chunk")]
    AudioChunk {
        /// Base64 encoded audio bytes
        audio: String,
        sequence: u64,
        is_final: bool,
    },
    #[serde(rename = "audio_end")]
    AudioEnd,
    #[serde(rename = "interrupt_ai")]
    InterruptAi,
    #[serde(rename = "transcript")]
    Transcript { text: String, is_final: bool },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        ServerMessage::Status {
            message: message.into(),
        }
    }
}

/// Items read off the channel, already split by frame class
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Audio(Bytes),
    Control(ClientMessage),
}

/// Routing for the outbound writer task
#[derive(Debug)]
pub enum MessageRoute {
    Outgoing(ServerMessage),
    /// Flush what is queued, then close the socket
    Close,
}
