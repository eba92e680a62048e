//! Error taxonomy for the object store, codecs, and pack resolver.
//!
//! CLI code wraps these in `eyre::Report` via `.context(...)`; library
//! code should never need `eyre` itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("usage error: {0}")]
    UsageError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },

    #[error("compression error: {0}")]
    CompressionError(String),

    #[error("corrupt pack: {0}")]
    CorruptPack(String),

    #[error("unresolved deltas: {0} entries could not be resolved after a full pass")]
    UnresolvedDeltas(usize),

    #[error("remote error: {0}")]
    RemoteError(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, GitError>;
