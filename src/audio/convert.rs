//! Sample format conversion between wire PCM16 and hardware f32
//!
//! The speech endpoints exchange raw little-endian 16-bit signed PCM; the
//! audio hardware works in normalized f32. Conversion is stateless and
//! lossless within PCM16 quantization: a PCM16 -> f32 -> PCM16 round trip is
//! the identity.

/// Scale factor between 16-bit PCM and normalized float samples
const PCM16_SCALE: f32 = 32768.0;

/// Convert 16-bit PCM samples to normalized f32 samples in [-1.0, 1.0)
#[must_use]
pub fn pcm16_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| f32::from(s) / PCM16_SCALE).collect()
}

/// Convert normalized f32 samples to 16-bit PCM
///
/// Samples are clamped to [-1.0, 1.0] before scaling, so out-of-range input
/// saturates instead of wrapping. Rounds to the nearest integer.
#[must_use]
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let scaled = (s.clamp(-1.0, 1.0) * PCM16_SCALE).round();
            #[allow(clippy::cast_possible_truncation)]
            let clamped = scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
            clamped
        })
        .collect()
}

/// Encode PCM16 samples as little-endian bytes for the wire
#[must_use]
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// Decode little-endian bytes from the wire into PCM16 samples
///
/// A trailing odd byte (torn sample) is dropped.
#[must_use]
pub fn pcm16_from_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_is_identity_over_full_range() {
        // Every i16 is exactly representable in f32 and the scale is a power
        // of two, so the round trip must be exact, not just within 1 unit.
        let samples: Vec<i16> = (i16::MIN..=i16::MAX).collect();
        let floats = pcm16_to_float(&samples);
        let back = float_to_pcm16(&floats);
        assert_eq!(back, samples);
    }

    #[test]
    fn test_float_range_is_normalized() {
        let floats = pcm16_to_float(&[i16::MIN, 0, i16::MAX]);
        assert!((floats[0] + 1.0).abs() < f32::EPSILON);
        assert!(floats[1].abs() < f32::EPSILON);
        assert!(floats[2] < 1.0);
    }

    #[test]
    fn test_out_of_range_floats_saturate() {
        let pcm = float_to_pcm16(&[2.0, -2.0, 1.0, -1.0]);
        assert_eq!(pcm, vec![i16::MAX, i16::MIN, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_bytes_are_little_endian() {
        let bytes = pcm16_to_bytes(&[0x0102, -2]);
        assert_eq!(bytes, vec![0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let samples = vec![0, 1, -1, i16::MIN, i16::MAX, 12345, -12345];
        assert_eq!(pcm16_from_bytes(&pcm16_to_bytes(&samples)), samples);
    }

    #[test]
    fn test_trailing_odd_byte_dropped() {
        assert_eq!(pcm16_from_bytes(&[0x02, 0x01, 0xAB]), vec![0x0102]);
    }

    #[test]
    fn test_empty_buffers() {
        assert!(pcm16_to_float(&[]).is_empty());
        assert!(float_to_pcm16(&[]).is_empty());
        assert!(pcm16_to_bytes(&[]).is_empty());
        assert!(pcm16_from_bytes(&[]).is_empty());
    }
}
