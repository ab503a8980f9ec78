//! Live speech recognition.
//!
//! A [`SpeechRecognizer`] opens one [`SpeechSession`] per call. Audio is fed
//! without waiting on the provider and results come back as normalized
//! [`SpeechEvent`]s.

pub mod base;
pub mod deepgram;

pub use base::{
    STTConfig, STTError, SessionBackend, SessionCommand, SpeechEvent, SpeechRecognizer,
    SpeechSession,
};
pub use deepgram::DeepgramRecognizer;

pub type STTResult<T> = Result<T, STTError>;
