//! Conversion between linear float samples and the wire sample format.
//!
//! The caller sends mono 16-bit signed little-endian PCM. Playback-side
//! buffers are `f32` in `[-1.0, 1.0]`. Everything here is stateless.

use base64::{Engine as _, engine::general_purpose};

/// Wire sample format descriptor
pub const WIRE_ENCODING: &str = "linear16";

/// Default capture sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Bytes per PCM16 sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// Convert float samples to PCM16, clamping out-of-range input.
///
/// Negative values scale by 0x8000 and positive values by 0x7FFF so that
/// both -1.0 and 1.0 map onto the extremes of the i16 range.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let clamped = s.clamp(-1.0, 1.0);
            if clamped < 0.0 {
                (clamped * 32768.0) as i16
            } else {
                (clamped * 32767.0) as i16
            }
        })
        .collect()
}

/// Convert PCM16 samples back to floats in `[-1.0, 1.0]`.
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| {
            if s < 0 {
                s as f32 / 32768.0
            } else {
                s as f32 / 32767.0
            }
        })
        .collect()
}

/// Interpret a little-endian byte buffer as PCM16 samples.
///
/// A trailing odd byte is ignored.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Serialize PCM16 samples into little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Float samples straight to wire bytes.
pub fn f32_to_wire_bytes(samples: &[f32]) -> Vec<u8> {
    samples_to_bytes(&f32_to_pcm16(samples))
}

/// Duration in milliseconds of a PCM16 mono buffer.
pub fn pcm16_duration_ms(byte_len: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    let samples = (byte_len / BYTES_PER_SAMPLE) as u64;
    samples * 1000 / sample_rate as u64
}

pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_pcm16_extremes() {
        let pcm = f32_to_pcm16(&[-1.0, 0.0, 1.0]);
        assert_eq!(pcm, vec![-32768, 0, 32767]);
    }

    #[test]
    fn test_f32_to_pcm16_clamps() {
        let pcm = f32_to_pcm16(&[-3.5, 2.0]);
        assert_eq!(pcm, vec![-32768, 32767]);
    }

    #[test]
    fn test_pcm16_to_f32_extremes() {
        let floats = pcm16_to_f32(&[-32768, 0, 32767]);
        assert_eq!(floats, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_bytes_are_little_endian() {
        let bytes = samples_to_bytes(&[1, -2]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF]);
        assert_eq!(bytes_to_samples(&bytes), vec![1, -2]);
    }

    #[test]
    fn test_bytes_to_samples_ignores_odd_tail() {
        assert_eq!(bytes_to_samples(&[0x10, 0x00, 0x7F]), vec![16]);
    }

    #[test]
    fn test_pcm16_duration() {
        // one second of 16 kHz mono
        assert_eq!(pcm16_duration_ms(32000, 16000), 1000);
        assert_eq!(pcm16_duration_ms(320, 16000), 10);
        assert_eq!(pcm16_duration_ms(320, 0), 0);
    }

    #[test]
    fn test_base64_decode_rejects_garbage() {
        assert!(decode_base64("***").is_err());
        assert_eq!(decode_base64(&encode_base64(b"abc")).unwrap(), b"abc");
    }
}
