pub mod audio;
pub mod call;
pub mod llm;
pub mod state;
pub mod stream;
pub mod stt;
pub mod transport;
pub mod tts;
pub mod turn;

// Re-export commonly used types for convenience
pub use audio::{AudioChunk, ChunkError, ChunkSequencer};
pub use call::{Call, CallRegistry};
pub use stream::{CancellableStream, StreamSink};

pub use stt::{DeepgramRecognizer, STTConfig, STTError, STTResult, SpeechEvent, SpeechRecognizer, SpeechSession};

pub use llm::{
    ChatMessage, LLMConfig, LLMError, OpenAIChatModel, ResponseGenerator, TokenStream,
    ToolLoopGenerator,
};

pub use tts::{
    AudioStream, SpeechSynthesizer, TTSConfig, TTSError, TTSResult, create_synthesizer,
};

pub use transport::{ClientMessage, Inbound, MessageRoute, ServerMessage, TransportHandle};

pub use turn::{
    CallBackends, ConversationHistory, TurnController, TurnSettings, TurnState,
};

// Re-export CoreState for external use
pub use state::{BackendProvider, ConfiguredBackends, CoreState};
