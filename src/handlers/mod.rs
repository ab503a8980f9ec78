//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `sessions` - Single-use tokens for the call socket
//! - `ws` - WebSocket call handling

pub mod api;
pub mod sessions;
pub mod ws;

// Re-export commonly used handlers for convenient access
pub use ws::ws_voice_handler;
