//! Persistence boundary for the ledger.
//!
//! A [`LedgerStore`] offers unique lookups on every natural key and a single
//! atomic [`LedgerStore::commit`]. Readers must observe either none or all
//! of a committed [`ChangeSet`]. Id allocation and read-modify-write
//! serialization live above this layer, in the ledger's transactions.
//!
//! Two backends:
//!
//! - [`MemoryStore`] - in-process maps, for tests and ephemeral nodes
//! - [`RocksStore`] - RocksDB-backed persistent storage

mod memory;
mod rocks;

pub use memory::MemoryStore;
pub use rocks::RocksStore;

use crate::error::Result;
use crate::models::{
    EntryId, LedgerEntry, Peer, PeerId, Predicate, PublicKey, Resource, ResourceId, Statement,
    StatementId, Triple,
};
use std::collections::BTreeMap;

/// Record tables, for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Peers,
    Resources,
    Statements,
    Entries,
}

/// Records written by one transaction.
///
/// Peers and resources are only ever inserted; statements and entries are
/// upserted by id.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub peers: Vec<Peer>,
    pub resources: Vec<Resource>,
    pub statements: BTreeMap<StatementId, Statement>,
    pub entries: BTreeMap<EntryId, LedgerEntry>,
}

impl ChangeSet {
    /// Check if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
            && self.resources.is_empty()
            && self.statements.is_empty()
            && self.entries.is_empty()
    }
}

/// Typed record storage with unique-key lookups.
pub trait LedgerStore: Send + Sync {
    /// Get a peer by id.
    fn peer(&self, id: PeerId) -> Result<Option<Peer>>;

    /// Get a peer by its public key.
    fn peer_by_key(&self, key: &PublicKey) -> Result<Option<Peer>>;

    /// Get a resource by id.
    fn resource(&self, id: ResourceId) -> Result<Option<Resource>>;

    /// Get a resource by name.
    fn resource_by_name(&self, name: &str) -> Result<Option<Resource>>;

    /// Get a statement by id.
    fn statement(&self, id: StatementId) -> Result<Option<Statement>>;

    /// Get a statement by its (subject, predicate, object) triple.
    fn statement_by_triple(&self, triple: &Triple) -> Result<Option<Statement>>;

    /// All statements with the given subject and predicate, in id order.
    fn statements_with_subject(
        &self,
        subject: ResourceId,
        predicate: Predicate,
    ) -> Result<Vec<Statement>>;

    /// Get a ledger entry by id.
    fn entry(&self, id: EntryId) -> Result<Option<LedgerEntry>>;

    /// Get the entry for a (statement, peer) pair.
    fn entry_for(&self, statement: StatementId, peer: PeerId) -> Result<Option<LedgerEntry>>;

    /// Number of records in a table. Ids in that table are `1..=count`.
    fn count(&self, table: Table) -> Result<u64>;

    /// Atomically apply a change set.
    fn commit(&self, changes: ChangeSet) -> Result<()>;
}
