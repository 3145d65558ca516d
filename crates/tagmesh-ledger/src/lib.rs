//! TagMesh Ledger - Converging Statement Store
//!
//! Peers attach labels and descriptive relations to shared content by
//! signing add/remove operations on (subject, predicate, object)
//! statements. The ledger merges those operations from any number of
//! mutually distrusting peers into one local view of which statements are
//! shown, suggested or hidden, and samples operations for gossip.
//!
//! # Architecture
//!
//! - **Models**: Peers, resources, statements, ledger entries and wire operations
//! - **Storage**: RocksDB-backed persistent storage, or in-memory maps
//! - **Merge**: Per-(statement, peer) last-writer-wins by logical clock
//! - **Visibility**: Score thresholds plus the local user's override
//! - **Gossip**: Bounded random sampling of operations to push to peers
//! - **Signing**: ed25519 over a canonical operation encoding
//!
//! # Example
//!
//! ```no_run
//! use tagmesh_ledger::{Ledger, LedgerConfig, OperationKind, Predicate};
//!
//! fn main() -> tagmesh_ledger::Result<()> {
//!     let config = LedgerConfig::from_env()?;
//!     let ledger = Ledger::open(&config)?;
//!     let node_key = ledger.store().get_or_create_node_key()?;
//!
//!     let signed = ledger.add_local(&node_key, "infohash", Predicate::HasTag, "linux", OperationKind::Add)?;
//!     let bytes = signed.to_bytes()?;
//!     // ... hand `bytes` to the transport
//!
//!     println!("{:?}", ledger.objects_for("infohash", Predicate::HasTag)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod signing;
pub mod storage;
pub mod visibility;

mod gossip;
mod merge;
mod txn;

pub use config::LedgerConfig;
pub use error::{Error, Result};
pub use ledger::{now_millis, Ledger};
pub use models::{
    EntryId, LedgerEntry, OperationKind, Peer, PeerId, Predicate, Provenance, PublicKey, Resource,
    ResourceId, SignedOperation, Statement, StatementId, Triple, WireOperation,
    AUTO_GENERATED_KEY, CLOCK_START_VALUE,
};
pub use storage::{ChangeSet, LedgerStore, MemoryStore, RocksStore, Table};
pub use visibility::{Visibility, VisibilityPolicy, HIDE_THRESHOLD, SHOW_THRESHOLD};
