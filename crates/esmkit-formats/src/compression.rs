//! Compression adapter for record payloads
//!
//! Compressed records store a 4-byte little-endian uncompressed length
//! followed by a zlib (deflate) stream. The archive-adjacent tooling uses
//! LZ4 frames instead. Both codecs are exposed as byte-buffer-in,
//! byte-buffer-out functions that check the produced length against the
//! declared one.

use crate::error::{FormatError, FormatResult};
use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::{Read, Write};

/// Maximum allowed decompression size (256 MiB)
///
/// Individual record payloads are tens of kilobytes; the ceiling stops a
/// corrupt length prefix from triggering a huge allocation.
pub const MAX_DECOMPRESSION_SIZE: usize = 256 * 1024 * 1024;

/// Size of the uncompressed-length prefix of a compressed record payload
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Supported codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// zlib-wrapped deflate, used by compressed records
    Deflate,
    /// LZ4 frame format
    Lz4Frame,
}

/// Compress `data` with the given codec
pub fn compress(data: &[u8], codec: Codec) -> FormatResult<Vec<u8>> {
    match codec {
        Codec::Deflate => {
            let mut encoder = ZlibEncoder::new(data, Compression::default());
            let mut compressed = Vec::new();
            encoder
                .read_to_end(&mut compressed)
                .map_err(|e| FormatError::Compression(format!("deflate failed: {e}")))?;
            Ok(compressed)
        }
        Codec::Lz4Frame => {
            let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
            encoder
                .write_all(data)
                .map_err(|e| FormatError::Compression(format!("LZ4 frame failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| FormatError::Compression(format!("LZ4 frame failed: {e}")))
        }
    }
}

/// Decompress `data`, which must expand to exactly `expected_len` bytes
///
/// The output buffer is allocated up front at the declared length. Producing
/// fewer or more bytes is a [`FormatError::SizeMismatch`].
pub fn decompress(data: &[u8], codec: Codec, expected_len: usize) -> FormatResult<Vec<u8>> {
    if expected_len > MAX_DECOMPRESSION_SIZE {
        return Err(FormatError::Decompression(format!(
            "declared size {expected_len} exceeds limit of {MAX_DECOMPRESSION_SIZE} bytes"
        )));
    }

    let mut decompressed = Vec::with_capacity(expected_len);
    // One byte of slack so that oversized output is detected without
    // inflating an unbounded stream.
    let limit = expected_len as u64 + 1;
    let result = match codec {
        Codec::Deflate => ZlibDecoder::new(data)
            .take(limit)
            .read_to_end(&mut decompressed),
        Codec::Lz4Frame => lz4_flex::frame::FrameDecoder::new(data)
            .take(limit)
            .read_to_end(&mut decompressed),
    };
    result.map_err(|e| FormatError::Decompression(format!("{codec:?}: {e}")))?;

    if decompressed.len() != expected_len {
        return Err(FormatError::SizeMismatch {
            expected: expected_len,
            actual: decompressed.len(),
        });
    }
    Ok(decompressed)
}

/// Build a compressed record payload: length prefix plus deflate stream
pub fn encode_record_payload(data: &[u8]) -> FormatResult<Vec<u8>> {
    let declared = u32::try_from(data.len()).map_err(|_| FormatError::TooLarge {
        what: "uncompressed record payload",
        size: data.len(),
    })?;
    let compressed = compress(data, Codec::Deflate)?;
    let mut payload = Vec::with_capacity(LENGTH_PREFIX_SIZE + compressed.len());
    payload.extend_from_slice(&declared.to_le_bytes());
    payload.extend_from_slice(&compressed);
    Ok(payload)
}

/// Inflate a compressed record payload
pub fn decode_record_payload(payload: &[u8]) -> FormatResult<Vec<u8>> {
    let Some((prefix, body)) = payload.split_first_chunk::<LENGTH_PREFIX_SIZE>() else {
        return Err(FormatError::Decompression(format!(
            "compressed payload of {} bytes is too short for its length prefix",
            payload.len()
        )));
    };
    let declared = u32::from_le_bytes(*prefix) as usize;
    if body.is_empty() {
        return Err(FormatError::Decompression(
            "compressed payload carries no compressed data".to_string(),
        ));
    }
    decompress(body, Codec::Deflate, declared)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_round_trip() {
        let data = b"EDID\x08\x00IronSword\x00FULL\x05\x00Iron\x00".repeat(20);
        let compressed = compress(&data, Codec::Deflate).expect("Test operation should succeed");
        assert!(compressed.len() < data.len());

        let decompressed = decompress(&compressed, Codec::Deflate, data.len())
            .expect("Test operation should succeed");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_lz4_frame_round_trip() {
        let data = (0..=255u8).cycle().take(4096).collect::<Vec<_>>();
        let compressed = compress(&data, Codec::Lz4Frame).expect("Test operation should succeed");
        let decompressed = decompress(&compressed, Codec::Lz4Frame, data.len())
            .expect("Test operation should succeed");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_declared_size_too_small() {
        let data = b"sixteen bytes!!!";
        let compressed = compress(data, Codec::Deflate).expect("Test operation should succeed");

        let result = decompress(&compressed, Codec::Deflate, data.len() - 1);
        assert!(matches!(
            result,
            Err(FormatError::SizeMismatch { expected: 15, actual: 16 })
        ));
    }

    #[test]
    fn test_declared_size_too_large() {
        let data = b"sixteen bytes!!!";
        let compressed = compress(data, Codec::Lz4Frame).expect("Test operation should succeed");

        let result = decompress(&compressed, Codec::Lz4Frame, 100);
        assert!(matches!(
            result,
            Err(FormatError::SizeMismatch { expected: 100, actual: 16 })
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = decompress(&[0xFF; 32], Codec::Deflate, 32);
        assert!(matches!(result, Err(FormatError::Decompression(_))));
    }

    #[test]
    fn test_size_limit() {
        let result = decompress(&[0x78, 0x9C], Codec::Deflate, MAX_DECOMPRESSION_SIZE + 1);
        assert!(
            result
                .expect_err("Test operation should fail")
                .to_string()
                .contains("exceeds limit")
        );
    }

    #[test]
    fn test_record_payload_round_trip() {
        let data = b"DATA\x04\x00\x01\x02\x03\x04".to_vec();
        let payload = encode_record_payload(&data).expect("Test operation should succeed");
        assert_eq!(&payload[..4], &(data.len() as u32).to_le_bytes());

        let decoded = decode_record_payload(&payload).expect("Test operation should succeed");
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_record_payload_wrong_prefix() {
        let data = b"some record fields".to_vec();
        let mut payload = encode_record_payload(&data).expect("Test operation should succeed");
        payload[..4].copy_from_slice(&99u32.to_le_bytes());

        assert!(matches!(
            decode_record_payload(&payload),
            Err(FormatError::SizeMismatch { expected: 99, .. })
        ));
    }

    #[test]
    fn test_record_payload_too_short() {
        assert!(decode_record_payload(&[1, 0]).is_err());
        assert!(decode_record_payload(&[1, 0, 0, 0]).is_err());
    }
}
