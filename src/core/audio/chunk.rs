//! Sequence-numbered audio chunks and in-order reassembly.
//!
//! Chunks of one synthesis must arrive strictly in ascending sequence order
//! starting at 0. A gap, a repeat or anything after the final chunk is a
//! protocol violation and is reported, never papered over.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// One independently transportable piece of synthesized audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub data: Bytes,
    pub sequence: u64,
    /// Set on the last chunk of a synthesis
    pub is_final: bool,
}

impl AudioChunk {
    pub fn new(data: impl Into<Bytes>, sequence: u64, is_final: bool) -> Self {
        Self {
            data: data.into(),
            sequence,
            is_final,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("Audio chunk out of order: expected sequence {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },
    #[error("Audio chunk {sequence} arrived after the final chunk")]
    AfterFinal { sequence: u64 },
}

/// Tracks the next expected sequence number of a chunk stream.
#[derive(Debug, Default, Clone)]
pub struct ChunkSequencer {
    next: u64,
    finished: bool,
}

impl ChunkSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `chunk` if it is the next one in order.
    pub fn check(&mut self, chunk: &AudioChunk) -> Result<(), ChunkError> {
        if self.finished {
            return Err(ChunkError::AfterFinal {
                sequence: chunk.sequence,
            });
        }
        if chunk.sequence != self.next {
            return Err(ChunkError::OutOfOrder {
                expected: self.next,
                got: chunk.sequence,
            });
        }
        self.next += 1;
        self.finished = chunk.is_final;
        Ok(())
    }

    pub fn next_sequence(&self) -> u64 {
        self.next
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Rebuilds the byte payload of one synthesis from its chunks.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    sequencer: ChunkSequencer,
    buffer: BytesMut,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &AudioChunk) -> Result<(), ChunkError> {
        self.sequencer.check(chunk)?;
        self.buffer.extend_from_slice(&chunk.data);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.sequencer.is_finished()
    }

    pub fn chunk_count(&self) -> u64 {
        self.sequencer.next_sequence()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}
