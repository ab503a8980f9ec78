//! Duplex channel contract between the caller device and the turn controller.
//!
//! Framing only: this module knows the message taxonomy but never inspects
//! audio content. The axum WebSocket glue lives in `handlers::ws`.

pub mod handle;
pub mod messages;

pub use handle::{CHANNEL_BUFFER_SIZE, TransportError, TransportHandle};
pub use messages::{ClientMessage, Inbound, MessageRoute, ServerMessage};
