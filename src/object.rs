//! Canonical object representation and content-addressed store (C3).
//!
//! A canonical object is `<type> <decimal-size>\0<payload>`; its OID is
//! the SHA-1 of that exact byte sequence. The canonical header is part
//! of the hashed preimage but is stripped before payload bytes reach a
//! caller — [`canonicalize`] and [`split_header`] are the only two
//! functions allowed to see both sides of that boundary, so the hash
//! and the stored bytes can never drift apart.

use crate::compress::inflate;
use crate::error::{GitError, Result};
use crate::hash::{from_hex, sha1, to_hex};
use crate::repo::Repo;
use crate::tree::{self, TreeEntry};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use io_tee::TeeWriter;
use sha1::{Digest, Sha1};
use std::fmt;
use std::fs;
use std::io::Write as _;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "commit" => Ok(Self::Commit),
            "tree" => Ok(Self::Tree),
            "blob" => Ok(Self::Blob),
            "tag" => Ok(Self::Tag),
            other => Err(GitError::Malformed {
                what: "object type",
                detail: format!("unrecognized type {other:?}"),
            }),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectMode {
    Normal,
    Executable,
    Symlink,
    Directory,
}

impl ObjectMode {
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "100644",
            Self::Executable => "100755",
            Self::Symlink => "120000",
            Self::Directory => "40000",
        }
    }
}

impl fmt::Display for ObjectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ObjectMode {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "100644" => Ok(Self::Normal),
            "100755" => Ok(Self::Executable),
            "120000" => Ok(Self::Symlink),
            "40000" | "040000" => Ok(Self::Directory),
            other => Err(GitError::Malformed {
                what: "tree entry mode",
                detail: format!("unrecognized mode {other:?}"),
            }),
        }
    }
}

/// A 20-byte SHA-1 object identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHash([u8; 20]);

impl ObjectHash {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self(from_hex(s)?))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn as_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.as_hex())
    }
}

/// Build the canonical byte sequence `<type> <size>\0<payload>` whose
/// SHA-1 is the object's OID.
pub fn canonicalize(obj_type: ObjectType, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 16);
    write!(buf, "{} {}\0", obj_type, payload.len()).expect("write to Vec cannot fail");
    buf.extend_from_slice(payload);
    buf
}

/// Split a canonical byte sequence into its declared type, declared
/// size, and payload span.
pub fn split_header(canonical: &[u8]) -> Result<(ObjectType, usize, &[u8])> {
    let nul = canonical
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| GitError::Malformed {
            what: "object header",
            detail: "missing NUL separator".into(),
        })?;

    let header = std::str::from_utf8(&canonical[..nul]).map_err(|_| GitError::Malformed {
        what: "object header",
        detail: "not valid UTF-8".into(),
    })?;

    let (type_str, size_str) = header.split_once(' ').ok_or_else(|| GitError::Malformed {
        what: "object header",
        detail: format!("missing space in {header:?}"),
    })?;

    let size: usize = size_str.parse().map_err(|_| GitError::Malformed {
        what: "object header",
        detail: format!("non-numeric size {size_str:?}"),
    })?;

    Ok((type_str.parse()?, size, &canonical[nul + 1..]))
}

/// Content-addressed store of canonical objects under `.git/objects`.
pub struct ObjectStore<'a> {
    repo: &'a Repo,
}

impl<'a> ObjectStore<'a> {
    pub fn new(repo: &'a Repo) -> Self {
        Self { repo }
    }

    /// Read the canonical bytes of the object at `oid`. Does not
    /// validate the hash; callers who need that call [`Self::verify`].
    pub fn read(&self, oid: &ObjectHash) -> Result<Vec<u8>> {
        let path = self.repo.object_path(oid);
        let compressed = fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                GitError::NotFound(oid.as_hex())
            } else {
                GitError::IoError(err)
            }
        })?;
        inflate(&compressed)
    }

    pub fn verify(&self, oid: &ObjectHash, canonical: &[u8]) -> Result<()> {
        let actual = ObjectHash::from_bytes(sha1(canonical));
        if &actual != oid {
            return Err(GitError::HashMismatch {
                expected: oid.as_hex(),
                actual: actual.as_hex(),
            });
        }
        Ok(())
    }

    /// Write already-canonicalized bytes to the store, returning their
    /// OID. Hashing and deflating happen in a single pass over
    /// `canonical` via a [`TeeWriter`] that fans the bytes out to both
    /// a SHA-1 hasher and the zlib encoder writing the temp file.
    /// Writes go through a temporary sibling file and an atomic rename
    /// so a reader never observes a partially-written object.
    pub fn write(&self, canonical: &[u8]) -> Result<ObjectHash> {
        let objects_dir = self.repo.objects_dir();
        fs::create_dir_all(&objects_dir)?;

        let mut tmp = NamedTempFile::new_in(&objects_dir)?;
        let mut hasher = Sha1::new();
        {
            let mut encoder = ZlibEncoder::new(&mut tmp, Compression::default());
            let mut tee = TeeWriter::new(&mut hasher, &mut encoder);
            tee.write_all(canonical)?;
            encoder.finish()?;
        }
        let oid = ObjectHash::from_bytes(hasher.finalize().into());

        let path = self.repo.object_path(&oid);
        fs::create_dir_all(path.parent().expect("object path always has a parent"))?;
        tmp.persist(&path)
            .map_err(|err| GitError::IoError(err.error))?;

        Ok(oid)
    }
}

/// A filesystem path waiting to be hashed (and optionally stored) as a
/// blob or tree, or a fully-formed in-memory commit. This is the
/// *write* path used by `hash-object`, `write-tree`, and `commit-tree`;
/// see [`ObjectStore`] for the read/write-by-OID path used elsewhere.
#[derive(Debug)]
pub enum Source {
    Blob(PathBuf),
    Tree(PathBuf),
    Commit(crate::commit::Commit),
}

impl Source {
    pub fn blob(path: impl Into<PathBuf>) -> Self {
        Self::Blob(path.into())
    }

    pub fn tree(path: impl Into<PathBuf>) -> Self {
        Self::Tree(path.into())
    }

    pub fn commit(commit: crate::commit::Commit) -> Self {
        Self::Commit(commit)
    }

    fn mode(path: &Path) -> Result<ObjectMode> {
        let meta = fs::symlink_metadata(path)?;
        Ok(if meta.is_dir() {
            ObjectMode::Directory
        } else if meta.file_type().is_symlink() {
            ObjectMode::Symlink
        } else if meta.mode() & 0o111 != 0 {
            ObjectMode::Executable
        } else {
            ObjectMode::Normal
        })
    }

    /// Compute the canonical bytes for this source, recursing into
    /// trees and hashing children first. `write` controls whether
    /// encountered objects (including this one) are persisted to the
    /// store.
    pub fn hash(&self, repo: &Repo, write: bool) -> Result<ObjectHash> {
        let store = ObjectStore::new(repo);

        match self {
            Self::Blob(path) => {
                let contents = fs::read(path)?;
                let canonical = canonicalize(ObjectType::Blob, &contents);
                if write {
                    store.write(&canonical)
                } else {
                    Ok(ObjectHash::from_bytes(sha1(&canonical)))
                }
            }

            Self::Tree(root) => {
                let mut entries: Vec<TreeEntry> = Vec::new();

                for child in fs::read_dir(root)? {
                    let child = child?;
                    let name = child.file_name();

                    // the repository's own metadata directory never
                    // participates in a tree
                    if name == ".git" {
                        continue;
                    }

                    let child_path = child.path();
                    let mode = Self::mode(&child_path)?;

                    let oid = if mode.is_directory() {
                        // empty directories have no git representation
                        if fs::read_dir(&child_path)?.next().is_none() {
                            continue;
                        }
                        Self::tree(child_path.clone()).hash(repo, write)?
                    } else {
                        Self::blob(child_path.clone()).hash(repo, write)?
                    };

                    entries.push(TreeEntry {
                        mode,
                        name: name.to_string_lossy().into_owned().into_bytes(),
                        oid,
                    });
                }

                let payload = tree::serialize(entries);
                let canonical = canonicalize(ObjectType::Tree, &payload);
                if write {
                    store.write(&canonical)
                } else {
                    Ok(ObjectHash::from_bytes(sha1(&canonical)))
                }
            }

            Self::Commit(commit) => {
                let payload = commit.serialize();
                let canonical = canonicalize(ObjectType::Commit, &payload);
                if write {
                    store.write(&canonical)
                } else {
                    Ok(ObjectHash::from_bytes(sha1(&canonical)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_blob_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repo::at(dir.path());
        repo.init("main").unwrap();
        let store = ObjectStore::new(&repo);

        let canonical = canonicalize(ObjectType::Blob, b"hello world\n");
        let oid = store.write(&canonical).unwrap();
        assert_eq!(oid.as_hex(), "3b18e512dba79e4c8300dd08aeb37f8e728b8dad");

        let read_back = store.read(&oid).unwrap();
        assert_eq!(read_back, canonical);
    }

    #[test]
    fn empty_blob_has_well_known_oid() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repo::at(dir.path());
        repo.init("main").unwrap();
        let store = ObjectStore::new(&repo);

        let oid = store.write(&canonicalize(ObjectType::Blob, b"")).unwrap();
        assert_eq!(oid.as_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn writing_an_existing_object_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repo::at(dir.path());
        repo.init("main").unwrap();
        let store = ObjectStore::new(&repo);

        let canonical = canonicalize(ObjectType::Blob, b"same contents");
        let first = store.write(&canonical).unwrap();
        let second = store.write(&canonical).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn directory_mode_zero_pads_to_six_digits() {
        assert_eq!(format!("{:0>6}", ObjectMode::Directory), "040000");
        assert_eq!(format!("{:0>6}", ObjectMode::Normal), "100644");
    }

    #[test]
    fn split_header_recovers_type_size_and_payload() {
        let canonical = canonicalize(ObjectType::Tree, b"abc");
        let (ty, size, payload) = split_header(&canonical).unwrap();
        assert_eq!(ty, ObjectType::Tree);
        assert_eq!(size, 3);
        assert_eq!(payload, b"abc");
    }
}
