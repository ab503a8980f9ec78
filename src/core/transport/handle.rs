//! Outbound side of the duplex channel as seen by the turn controller

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::audio::{AudioChunk, encode_base64};

use super::messages::{MessageRoute, ServerMessage};

/// Writer queue depth; larger than the default to absorb audio bursts
pub const CHANNEL_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,
}

/// Cloneable handle that frames messages for the writer task.
///
/// Order is preserved: messages are written in the order they were sent.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    tx: mpsc::Sender<MessageRoute>,
}

impl TransportHandle {
    pub fn new(tx: mpsc::Sender<MessageRoute>) -> Self {
        Self { tx }
    }

    /// Handle plus the receiving end the writer task drains.
    pub fn channel() -> (Self, mpsc::Receiver<MessageRoute>) {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        (Self::new(tx), rx)
    }

    pub async fn send_control(&self, message: ServerMessage) -> Result<(), TransportError> {
        self.tx
            .send(MessageRoute::Outgoing(message))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Frame an audio chunk as `audio_chunk` with a base64 payload.
    pub async fn send_audio(&self, chunk: &AudioChunk) -> Result<(), TransportError> {
        debug!(
            "Sending audio chunk #{} ({} bytes, final: {})",
            chunk.sequence,
            chunk.data.len(),
            chunk.is_final
        );
        self.send_control(ServerMessage::AudioChunk {
            audio: encode_base64(&chunk.data),
            sequence: chunk.sequence,
            is_final: chunk.is_final,
        })
        .await
    }

    /// Ask the writer to close the socket after draining queued messages.
    pub async fn close(&self) {
        let _ = self.tx.send(MessageRoute::Close).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_audio_encodes_base64() {
        let (handle, mut rx) = TransportHandle::channel();
        handle
            .send_audio(&AudioChunk::new(vec![0u8, 1, 2], 7, true))
            .await
            .unwrap();

        match rx.recv().await {
            Some(MessageRoute::Outgoing(ServerMessage::AudioChunk {
                audio,
                sequence,
                is_final,
            })) => {
                assert_eq!(audio, "AAEC");
                assert_eq!(sequence, 7);
                assert!(is_final);
            }
            other => panic!("unexpected route: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (handle, rx) = TransportHandle::channel();
        drop(rx);
        assert!(handle.is_closed());
        assert_eq!(
            handle.send_control(ServerMessage::AudioEnd).await,
            Err(TransportError::Closed)
        );
    }

    #[tokio::test]
    async fn test_preserves_order() {
        let (handle, mut rx) = TransportHandle::channel();
        handle.send_control(ServerMessage::AiResponseStart).await.unwrap();
        handle
            .send_control(ServerMessage::AiResponseChunk {
                text: "Hi".to_string(),
            })
            .await
            .unwrap();
        handle.send_control(ServerMessage::AiResponseEnd).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            if let Some(MessageRoute::Outgoing(msg)) = rx.recv().await {
                seen.push(msg);
            }
        }
        assert_eq!(
            seen,
            vec![
                ServerMessage::AiResponseStart,
                ServerMessage::AiResponseChunk {
                    text: "Hi".to_string()
                },
                ServerMessage::AiResponseEnd,
            ]
        );
    }
}
