//! Signed 16-bit little-endian mono sample encoding.

use crate::error::{CodecError, CodecResult};

pub const BYTES_PER_SAMPLE: usize = 2;
pub const MAX_SAMPLE: i16 = i16::MAX;
pub const MIN_SAMPLE: i16 = i16::MIN;

/// Encodes one sample. Fails unless `MIN_SAMPLE <= value <= MAX_SAMPLE`.
pub fn encode_sample(value: i32) -> CodecResult<[u8; BYTES_PER_SAMPLE]> {
    i16::try_from(value)
        .map(i16::to_le_bytes)
        .map_err(|_| CodecError::OutOfRange(value as f64))
}

pub fn decode_sample(bytes: [u8; BYTES_PER_SAMPLE]) -> i16 {
    i16::from_le_bytes(bytes)
}

pub fn encode_samples(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

pub fn decode_samples(bytes: &[u8]) -> CodecResult<Vec<i16>> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(CodecError::OddByteCount(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| decode_sample([pair[0], pair[1]]))
        .collect())
}

/// Scales a float in `[-1.0, 1.0]` to a sample, truncating toward zero.
pub fn sample_from_unit(value: f32) -> CodecResult<i16> {
    let scaled = value as f64 * MAX_SAMPLE as f64;
    if !scaled.is_finite() || scaled < MIN_SAMPLE as f64 || scaled > MAX_SAMPLE as f64 {
        return Err(CodecError::OutOfRange(scaled));
    }
    Ok(scaled as i16)
}

pub fn sample_to_unit(sample: i16) -> f32 {
    sample as f32 / MAX_SAMPLE as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sample_survives_encoding() {
        for value in i16::MIN..=i16::MAX {
            let bytes = encode_sample(value as i32).unwrap();
            assert_eq!(decode_sample(bytes), value);
        }
    }

    #[test]
    fn encoding_is_little_endian() {
        assert_eq!(encode_sample(1).unwrap(), [0x01, 0x00]);
        assert_eq!(encode_sample(-2).unwrap(), [0xFE, 0xFF]);
        assert_eq!(encode_samples(&[0x0102, -1]), vec![0x02, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn out_of_range_values_fail() {
        assert_eq!(encode_sample(32_768), Err(CodecError::OutOfRange(32_768.0)));
        assert_eq!(
            encode_sample(-32_769),
            Err(CodecError::OutOfRange(-32_769.0))
        );
        assert!(sample_from_unit(1.5).is_err());
        assert!(sample_from_unit(f32::NAN).is_err());
    }

    #[test]
    fn odd_byte_buffers_are_rejected() {
        assert_eq!(decode_samples(&[1, 2, 3]), Err(CodecError::OddByteCount(3)));
        assert_eq!(decode_samples(&[]), Ok(vec![]));
    }

    #[test]
    fn unit_scaling_hits_the_rails() {
        assert_eq!(sample_from_unit(1.0), Ok(MAX_SAMPLE));
        assert_eq!(sample_from_unit(-1.0), Ok(-MAX_SAMPLE));
        assert_eq!(sample_from_unit(0.0), Ok(0));
        assert!((sample_to_unit(MAX_SAMPLE) - 1.0).abs() < f32::EPSILON);
    }
}
