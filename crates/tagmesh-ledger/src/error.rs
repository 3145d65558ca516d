//! Error types for the statement ledger.

use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ledger operations.
///
/// A stale operation is not an error: the merge reports it as `Ok(false)`.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transfer encoding error
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Signature did not verify against the operation's creator key
    #[error("invalid signature from {creator}")]
    InvalidSignature { creator: String },

    /// A predicate or operation code outside the known set
    #[error("unknown {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: u16 },

    /// Stored state violates a ledger invariant
    #[error("Corrupt ledger: {0}")]
    Corrupt(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
