//! Data model for the statement ledger.
//!
//! # Catalogs
//!
//! - [`Peer`] - a public key that has authored operations
//! - [`Resource`] - a named subject or object (content id, tag string, ...)
//!
//! # Statements
//!
//! - [`Statement`] - a (subject, [`Predicate`], object) triple with
//!   aggregate add/remove counters and the local user's override
//!
//! # Operations
//!
//! - [`LedgerEntry`] - the live claim of one peer about one statement
//! - [`WireOperation`] - the unsigned transfer form that signatures cover
//! - [`SignedOperation`] - a wire operation plus its signature

mod operation;
mod peer;
mod resource;
mod statement;

pub use operation::{
    EntryId, LedgerEntry, OperationKind, Provenance, SignedOperation, WireOperation,
    CLOCK_START_VALUE,
};
pub use peer::{Peer, PeerId, PublicKey, AUTO_GENERATED_KEY};
pub use resource::{Resource, ResourceId};
pub use statement::{Predicate, Statement, StatementId, Triple};
