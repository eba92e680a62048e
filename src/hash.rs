//! SHA-1 hashing and hex codec (C1).

use crate::error::{GitError, Result};
use sha1::{Digest, Sha1};
use std::fmt::Write as _;

/// SHA-1 of an arbitrary byte sequence.
pub fn sha1(bytes: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Lowercase hex encoding of a 20-byte digest.
pub fn to_hex(bytes: &[u8; 20]) -> String {
    let mut hex = String::with_capacity(40);
    for byte in bytes {
        write!(hex, "{:02x}", byte).unwrap();
    }
    hex
}

/// Parse a 40-character hex string into a 20-byte digest.
pub fn from_hex(s: &str) -> Result<[u8; 20]> {
    if s.len() != 40 {
        return Err(GitError::Malformed {
            what: "hex oid",
            detail: format!("expected 40 characters, got {}", s.len()),
        });
    }

    let mut out = [0u8; 20];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hi = hex_digit(chunk[0])?;
        let lo = hex_digit(chunk[1])?;
        out[i] = (hi << 4) | lo;
    }
    Ok(out)
}

fn hex_digit(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(GitError::Malformed {
            what: "hex oid",
            detail: format!("invalid hex digit {:?}", c as char),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_blob_hash_is_well_known() {
        let preimage = b"blob 0\0";
        assert_eq!(
            to_hex(&sha1(preimage)),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }

    #[test]
    fn hex_round_trips() {
        let bytes = sha1(b"hello world\n");
        let hex = to_hex(&bytes);
        assert_eq!(from_hex(&hex).unwrap(), bytes);
    }

    #[test]
    fn from_hex_rejects_bad_length() {
        assert!(from_hex("abcd").is_err());
    }

    #[test]
    fn from_hex_rejects_bad_digit() {
        let bad = "z".repeat(40);
        assert!(from_hex(&bad).is_err());
    }
}
