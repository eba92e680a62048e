//! Directory-listing object codec (C4).
//!
//! A tree payload is a flat sequence of records, each
//! `<mode-ascii> <name-bytes>\0<20-byte-raw-oid>`, with no separator or
//! terminator between records. Names are arbitrary bytes (git paths
//! are not always UTF-8), so [`TreeEntry::name`] is kept as raw bytes
//! and only converted to `String` at the UI boundary.

use crate::error::{GitError, Result};
use crate::object::{ObjectHash, ObjectMode};
use std::io::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: ObjectMode,
    pub name: Vec<u8>,
    pub oid: ObjectHash,
}

impl TreeEntry {
    pub fn name_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn object_type(&self) -> &'static str {
        if self.mode.is_directory() {
            "tree"
        } else {
            "blob"
        }
    }
}

/// Parse a tree payload into its entries, in the order found. Does not
/// re-sort; see [`serialize`] for the canonical ordering.
pub fn parse(payload: &[u8]) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut cursor = 0;

    while cursor < payload.len() {
        let space = find(payload, cursor, b' ')?;
        let mode_str = std::str::from_utf8(&payload[cursor..space]).map_err(|_| malformed())?;
        let mode: ObjectMode = mode_str.parse()?;

        let name_start = space + 1;
        let nul = find(payload, name_start, 0)?;
        let name = payload[name_start..nul].to_vec();

        let oid_start = nul + 1;
        let oid_end = oid_start + 20;
        if oid_end > payload.len() {
            return Err(malformed());
        }
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&payload[oid_start..oid_end]);

        entries.push(TreeEntry {
            mode,
            name,
            oid: ObjectHash::from_bytes(raw),
        });

        cursor = oid_end;
    }

    Ok(entries)
}

/// Sort entries by the tree ordering rule and concatenate them into a
/// tree payload. Directory names are compared as if suffixed with `/`,
/// so `foo` sorts before `foo.txt` but after `foo/anything`.
pub fn serialize(mut entries: Vec<TreeEntry>) -> Vec<u8> {
    entries.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

    let mut buf = Vec::new();
    for entry in &entries {
        write!(buf, "{} ", entry.mode).expect("write to Vec cannot fail");
        buf.extend_from_slice(&entry.name);
        buf.push(0);
        buf.extend_from_slice(entry.oid.as_bytes());
    }
    buf
}

fn sort_key(entry: &TreeEntry) -> Vec<u8> {
    let mut key = entry.name.clone();
    if entry.mode.is_directory() {
        key.push(b'/');
    }
    key
}

fn find(payload: &[u8], from: usize, needle: u8) -> Result<usize> {
    payload[from..]
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
        .ok_or_else(malformed)
}

fn malformed() -> GitError {
    GitError::Malformed {
        what: "tree entry",
        detail: "truncated or missing delimiter".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mode: ObjectMode, name: &str, byte: u8) -> TreeEntry {
        TreeEntry {
            mode,
            name: name.as_bytes().to_vec(),
            oid: ObjectHash::from_bytes([byte; 20]),
        }
    }

    #[test]
    fn parse_then_serialize_sorts_by_name() {
        let entries = vec![
            entry(ObjectMode::Normal, "c.txt", 3),
            entry(ObjectMode::Directory, "a", 1),
            entry(ObjectMode::Normal, "b.txt", 2),
        ];
        let payload = serialize(entries);
        let parsed = parse(&payload).unwrap();
        let names: Vec<_> = parsed.iter().map(|e| e.name_lossy().into_owned()).collect();
        assert_eq!(names, vec!["a", "b.txt", "c.txt"]);
    }

    #[test]
    fn directory_sorts_as_if_name_had_trailing_slash() {
        // "foo" (a file) must sort before "foo.txt", and a directory
        // named "foo" must sort as "foo/", landing after "foo.txt"
        // would if "foo" the directory were compared bare.
        let entries = vec![
            entry(ObjectMode::Directory, "foo", 1),
            entry(ObjectMode::Normal, "foo.txt", 2),
        ];
        let payload = serialize(entries);
        let parsed = parse(&payload).unwrap();
        let names: Vec<_> = parsed.iter().map(|e| e.name_lossy().into_owned()).collect();
        assert_eq!(names, vec!["foo.txt", "foo"]);
    }

    #[test]
    fn parse_rejects_truncated_payload() {
        let mut payload = b"100644 a\0".to_vec();
        payload.extend_from_slice(&[0u8; 10]); // too short for a 20-byte oid
        assert!(parse(&payload).is_err());
    }

    #[test]
    fn single_file_tree_has_deterministic_oid() {
        use crate::hash::{sha1, to_hex};
        use crate::object::{canonicalize, ObjectType};

        let empty_blob = ObjectHash::from_bytes(sha1(b"blob 0\0"));
        let entries = vec![TreeEntry {
            mode: ObjectMode::Normal,
            name: b"hello".to_vec(),
            oid: empty_blob,
        }];
        let payload = serialize(entries);
        let canonical = canonicalize(ObjectType::Tree, &payload);
        let oid = to_hex(&sha1(&canonical));
        assert_eq!(oid.len(), 40);
    }
}
