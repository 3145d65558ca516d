//! Operations: the signed per-peer claims the ledger merges.

use crate::error::{Error, Result};
use crate::models::peer::serde_bytes_vec;
use crate::models::{PeerId, Predicate, PublicKey, StatementId};
use serde::{Deserialize, Serialize};

/// Initial logical clock. A peer's first real claim about a statement uses
/// `CLOCK_START_VALUE + 1`; bootstrap claims use the start value itself.
pub const CLOCK_START_VALUE: u64 = 0;

/// Whether a claim asserts or retracts a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum OperationKind {
    Add = 1,
    Remove = 2,
}

impl OperationKind {
    /// Stable wire code.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl From<OperationKind> for u8 {
    fn from(kind: OperationKind) -> Self {
        kind.code()
    }
}

impl TryFrom<u8> for OperationKind {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(OperationKind::Add),
            2 => Ok(OperationKind::Remove),
            other => Err(Error::UnknownCode {
                kind: "operation",
                code: u16::from(other),
            }),
        }
    }
}

/// Store-assigned ledger entry identifier. Dense from 1, which the gossip
/// sampler relies on for uniform probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

/// Where an operation came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Provenance {
    /// Authored by the local user; its kind becomes the statement's local override.
    pub local: bool,
    /// Synthesized by this node (bootstrap data); never gossiped.
    pub auto_generated: bool,
}

impl Provenance {
    /// Received from another peer.
    pub const fn remote() -> Self {
        Self {
            local: false,
            auto_generated: false,
        }
    }

    /// Authored by the local user.
    pub const fn local() -> Self {
        Self {
            local: true,
            auto_generated: false,
        }
    }

    /// Synthesized bootstrap data.
    pub const fn auto_generated() -> Self {
        Self {
            local: false,
            auto_generated: true,
        }
    }
}

/// The live claim of one peer about one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Store-assigned identifier
    pub id: EntryId,

    /// Statement this claim is about
    pub statement: StatementId,

    /// Peer that authored it
    pub peer: PeerId,

    /// Asserted or retracted
    pub kind: OperationKind,

    /// Peer-local logical clock
    pub clock: u64,

    /// Signature over the canonical encoding of the wire operation
    #[serde(with = "serde_bytes_vec")]
    pub signature: Vec<u8>,

    /// Unix timestamp in milliseconds of the last insert or supersede
    pub updated_at: u64,

    /// Synthesized bootstrap claim
    pub auto_generated: bool,

    /// Amount this claim contributes to its statement's counter
    pub weight: u32,
}

/// Unsigned content of a claim, as produced by its creator.
///
/// This is what signatures cover; it carries no database identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireOperation {
    pub subject: String,
    pub predicate: Predicate,
    pub object: String,
    pub operation: OperationKind,
    pub clock: u64,
    pub creator_public_key: PublicKey,
}

impl WireOperation {
    /// Build a wire operation.
    pub fn new(
        subject: impl Into<String>,
        predicate: Predicate,
        object: impl Into<String>,
        operation: OperationKind,
        clock: u64,
        creator_public_key: PublicKey,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
            operation,
            clock,
            creator_public_key,
        }
    }
}

/// A wire operation with its signature, as carried by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOperation {
    pub operation: WireOperation,
    #[serde(with = "serde_bytes_vec")]
    pub signature: Vec<u8>,
}

impl SignedOperation {
    pub fn new(operation: WireOperation, signature: Vec<u8>) -> Self {
        Self {
            operation,
            signature,
        }
    }

    /// Serialize to bytes for network transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes. Unknown predicate or operation codes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
