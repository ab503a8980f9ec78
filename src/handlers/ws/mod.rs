//! # WebSocket Call Handler Module
//!
//! One WebSocket connection is one call. Binary frames carry caller audio,
//! text frames carry JSON control messages in both directions.
//!
//! ## Connection Flow
//! 1. Client connects to `/ws` (with `?session_id=..&token=..` when sessions are required)
//! 2. Client sends `{"type": "start", "sample_rate": 16000, "channels": 1}`
//! 3. Server answers `status` once speech recognition is connected
//! 4. Client streams binary audio; the server transcribes, replies and speaks
//! 5. Client closes the socket to hang up
//!
//! ## Message Types
//!
//! **Incoming Messages:**
//! - `{"type": "start", "sample_rate": 16000, "channels": 1}` - Open speech recognition (fields optional)
//! - `{"type": "stop"}` - Close speech recognition and drop the partial utterance
//! - `{"type": "user_interrupted", "interruptedAt": 3.0, "totalDuration": 6.0, "fullText": "..."}` -
//!   Playback position at barge-in, used to trim the last assistant turn to what was heard
//! - **Binary messages** - Raw audio data for transcription
//!
//! **Outgoing Messages:**
//! - `{"type": "status", "message": "..."}`
//! - `{"type": "speech_started"}` / `{"type": "interrupt_ai"}`
//! - `{"type": "transcript", "text": "...", "is_final": true}`
//! - `{"type": "utterance_end", "transcript": "..."}`
//! - `{"type": "ai_response_start"}`, `{"type": "ai_response_chunk", "text": "..."}`, `{"type": "ai_response_end"}`
//! - `{"type": "audio_chunk", "audio": "<base64>", "sequence": 0, "is_final": false}` then `{"type": "audio_end"}`
//! - `{"type": "error", "message": "..."}`

mod handler;

pub use handler::{WsParams, ws_voice_handler};
