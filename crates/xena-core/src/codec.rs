// SPDX-License-Identifier: Apache-2.0

//! Fixed-width float segment codec. A full segment is 1000 little-endian
//! IEEE-754 f32 values; the last segment of a field may be shorter. NaN is
//! the missing-value marker for both numeric scores and category orderings.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Floats per full segment.
pub const SEGMENT_SIZE: usize = 1000;
/// Upper bound on an encoded segment payload.
pub const SEGMENT_BYTES: usize = SEGMENT_SIZE * 4;

#[must_use]
pub fn encode(scores: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(scores.len() * 4);
    for v in scores {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn decode(payload: &[u8]) -> Result<Vec<f32>> {
    if payload.len() % 4 != 0 {
        return Err(Error::decode(format!(
            "segment payload length {} is not a multiple of 4",
            payload.len()
        )));
    }
    if payload.len() > SEGMENT_BYTES {
        return Err(Error::decode(format!(
            "segment payload length {} exceeds {SEGMENT_BYTES}",
            payload.len()
        )));
    }
    Ok(payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Experimental variant: transpose the byte planes (all byte-0 of each
/// float, then all byte-1, ...) and gzip. Not part of the storage
/// contract; the loader never writes it and the segment cache never
/// reads it.
pub fn encode_sorted_gzip(scores: &[f32]) -> Result<Vec<u8>> {
    let plain = encode(scores);
    let n = scores.len();
    let mut transposed = Vec::with_capacity(plain.len());
    for plane in 0..4 {
        for i in 0..n {
            transposed.push(plain[i * 4 + plane]);
        }
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&transposed)?;
    Ok(encoder.finish()?)
}

pub fn decode_sorted_gzip(payload: &[u8]) -> Result<Vec<f32>> {
    let mut transposed = Vec::new();
    GzDecoder::new(payload).read_to_end(&mut transposed)?;
    if transposed.len() % 4 != 0 {
        return Err(Error::decode(format!(
            "transposed payload length {} is not a multiple of 4",
            transposed.len()
        )));
    }
    let n = transposed.len() / 4;
    let mut plain = vec![0_u8; transposed.len()];
    for plane in 0..4 {
        for i in 0..n {
            plain[i * 4 + plane] = transposed[plane * n + i];
        }
    }
    decode(&plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_bitwise() {
        let scores = [1.5_f32, -0.0, f32::MIN_POSITIVE, 3.25e7, -42.0];
        let decoded = decode(&encode(&scores)).expect("decode");
        for (a, b) in scores.iter().zip(&decoded) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn nan_bit_pattern_survives() {
        let quiet = f32::from_bits(0x7fc0_0001);
        let decoded = decode(&encode(&[quiet])).expect("decode");
        assert_eq!(decoded[0].to_bits(), 0x7fc0_0001);
        assert!(decoded[0].is_nan());
    }

    #[test]
    fn ragged_payload_is_a_decode_error() {
        let err = decode(&[0, 0, 0]).expect_err("ragged");
        assert_eq!(err.code(), "decode");
    }

    #[test]
    fn oversized_payload_is_a_decode_error() {
        let err = decode(&vec![0_u8; SEGMENT_BYTES + 4]).expect_err("oversize");
        assert_eq!(err.code(), "decode");
    }

    #[test]
    fn sorted_gzip_round_trips() {
        let scores: Vec<f32> = (0..SEGMENT_SIZE).map(|i| i as f32 / 7.0).collect();
        let payload = encode_sorted_gzip(&scores).expect("encode");
        let decoded = decode_sorted_gzip(&payload).expect("decode");
        assert_eq!(scores, decoded);
    }

    #[test]
    fn sorted_gzip_compresses_smooth_data() {
        let scores: Vec<f32> = (0..SEGMENT_SIZE).map(|i| i as f32).collect();
        let payload = encode_sorted_gzip(&scores).expect("encode");
        assert!(payload.len() < SEGMENT_BYTES / 2);
    }
}
