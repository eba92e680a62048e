//! zlib inflate/deflate with dynamic output sizing (C2).
//!
//! The packfile parser needs to know exactly how many *input* bytes a
//! deflate stream consumed, since one compressed stream is embedded in
//! a larger byte sequence with more entries following it. [`inflate_at`]
//! reports that alongside the decompressed bytes.

use crate::error::{GitError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Inflate a zlib stream of unknown decompressed size, growing the
/// output buffer dynamically.
pub fn inflate(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(input);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|err| GitError::CompressionError(err.to_string()))?;
    Ok(out)
}

/// Inflate a zlib stream whose decompressed size is already known (as
/// declared by a packfile entry header), returning the payload and the
/// number of input bytes consumed to reach end-of-stream.
///
/// A declared size of zero is legal: the deflate stream is still
/// non-empty and must be driven to completion to learn how many input
/// bytes it occupies.
pub fn inflate_at(input: &[u8], expected_len: usize) -> Result<(Vec<u8>, usize)> {
    let mut decoder = ZlibDecoder::new(input);

    if expected_len == 0 {
        let mut probe = [0u8; 1];
        let n = decoder
            .read(&mut probe)
            .map_err(|err| GitError::CompressionError(err.to_string()))?;
        if n != 0 {
            return Err(GitError::CompressionError(
                "object declared size 0 but stream produced bytes".into(),
            ));
        }
        return Ok((Vec::new(), decoder.total_in() as usize));
    }

    let mut out = vec![0u8; expected_len];
    decoder
        .read_exact(&mut out)
        .map_err(|err| GitError::CompressionError(err.to_string()))?;
    Ok((out, decoder.total_in() as usize))
}

/// Deflate a byte sequence at the default compression level.
pub fn deflate(input: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(input)
        .expect("writing to an in-memory buffer cannot fail");
    encoder
        .finish()
        .expect("finishing an in-memory buffer cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let compressed = deflate(&data);
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn round_trips_empty_input() {
        let compressed = deflate(b"");
        assert_eq!(inflate(&compressed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn inflate_at_reports_consumed_bytes_for_zero_size() {
        let compressed = deflate(b"");
        let (out, consumed) = inflate_at(&compressed, 0).unwrap();
        assert!(out.is_empty());
        assert_eq!(consumed, compressed.len());
    }

    #[test]
    fn inflate_at_reports_consumed_bytes_with_trailing_garbage() {
        let data = b"hello world";
        let compressed = deflate(data);
        let mut with_trailer = compressed.clone();
        with_trailer.extend_from_slice(b"TRAILING");
        let (out, consumed) = inflate_at(&with_trailer, data.len()).unwrap();
        assert_eq!(out, data);
        assert_eq!(consumed, compressed.len());
    }
}
