//! Audio primitives shared by the recognition and synthesis paths.

pub mod chunk;
pub mod codec;

pub use chunk::{AudioChunk, ChunkAssembler, ChunkError, ChunkSequencer};
pub use codec::{
    BYTES_PER_SAMPLE, DEFAULT_SAMPLE_RATE, WIRE_ENCODING, bytes_to_samples, decode_base64,
    encode_base64, f32_to_pcm16, f32_to_wire_bytes, pcm16_duration_ms, pcm16_to_f32,
    samples_to_bytes,
};
