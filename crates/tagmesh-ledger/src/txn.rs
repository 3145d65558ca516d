//! Write transactions over a [`LedgerStore`].
//!
//! A [`Transaction`] holds the ledger's writer lock for its whole lifetime,
//! reads through its own pending writes, allocates ids sequentially and
//! hands everything to the store as one [`ChangeSet`] on commit. Dropping
//! it without committing discards the writes.

use crate::error::{Error, Result};
use crate::models::{
    EntryId, LedgerEntry, Peer, PeerId, PublicKey, Resource, ResourceId, Statement, StatementId,
    Triple,
};
use crate::storage::{ChangeSet, LedgerStore, Table};
use std::collections::HashMap;
use std::sync::MutexGuard;

/// Next free id for each table.
#[derive(Debug, Default)]
struct NextIds {
    peer: Option<u64>,
    resource: Option<u64>,
    statement: Option<u64>,
    entry: Option<u64>,
}

/// A single atomic unit of ledger writes.
pub struct Transaction<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    _writer: MutexGuard<'a, ()>,
    changes: ChangeSet,
    next: NextIds,

    // Lookups for records created in this transaction
    new_peers: HashMap<PublicKey, Peer>,
    new_resources: HashMap<String, Resource>,
    new_triples: HashMap<Triple, StatementId>,
    new_entries: HashMap<(StatementId, PeerId), EntryId>,
}

impl<'a, S: LedgerStore + ?Sized> Transaction<'a, S> {
    /// Begin a transaction. `writer` must be the ledger-wide writer lock.
    pub(crate) fn begin(store: &'a S, writer: MutexGuard<'a, ()>) -> Self {
        Self {
            store,
            _writer: writer,
            changes: ChangeSet::default(),
            next: NextIds::default(),
            new_peers: HashMap::new(),
            new_resources: HashMap::new(),
            new_triples: HashMap::new(),
            new_entries: HashMap::new(),
        }
    }

    fn allocate(store: &S, slot: &mut Option<u64>, table: Table) -> Result<u64> {
        let id = match *slot {
            Some(id) => id,
            None => store.count(table)?.checked_add(1).ok_or_else(|| {
                Error::Storage(format!("{:?} id space exhausted", table))
            })?,
        };
        *slot = Some(id + 1);
        Ok(id)
    }

    /// Look up a peer by public key, inserting it if absent.
    pub fn find_or_insert_peer(&mut self, key: &PublicKey, now: u64) -> Result<Peer> {
        if let Some(peer) = self.new_peers.get(key) {
            return Ok(peer.clone());
        }
        if let Some(peer) = self.store.peer_by_key(key)? {
            return Ok(peer);
        }

        let id = Self::allocate(self.store, &mut self.next.peer, Table::Peers)?;
        let peer = Peer::new(PeerId(id), key.clone(), now);
        self.changes.peers.push(peer.clone());
        self.new_peers.insert(key.clone(), peer.clone());
        Ok(peer)
    }

    /// Look up a resource by name, inserting it if absent.
    pub fn find_or_insert_resource(&mut self, name: &str) -> Result<Resource> {
        if let Some(resource) = self.new_resources.get(name) {
            return Ok(resource.clone());
        }
        if let Some(resource) = self.store.resource_by_name(name)? {
            return Ok(resource);
        }

        let id = Self::allocate(self.store, &mut self.next.resource, Table::Resources)?;
        let resource = Resource::new(ResourceId(id), name);
        self.changes.resources.push(resource.clone());
        self.new_resources.insert(name.to_string(), resource.clone());
        Ok(resource)
    }

    /// Look up a statement by triple, inserting one with zeroed counters if absent.
    pub fn find_or_insert_statement(&mut self, triple: Triple) -> Result<Statement> {
        if let Some(id) = self.new_triples.get(&triple) {
            if let Some(statement) = self.changes.statements.get(id) {
                return Ok(statement.clone());
            }
        }
        if let Some(statement) = self.store.statement_by_triple(&triple)? {
            return Ok(self
                .changes
                .statements
                .get(&statement.id)
                .cloned()
                .unwrap_or(statement));
        }

        let id = StatementId(Self::allocate(
            self.store,
            &mut self.next.statement,
            Table::Statements,
        )?);
        let statement = Statement::new(id, triple);
        self.changes.statements.insert(id, statement.clone());
        self.new_triples.insert(triple, id);
        Ok(statement)
    }

    /// Get the entry for a (statement, peer) pair, including pending writes.
    pub fn entry_for(&self, statement: StatementId, peer: PeerId) -> Result<Option<LedgerEntry>> {
        if let Some(id) = self.new_entries.get(&(statement, peer)) {
            return Ok(self.changes.entries.get(id).cloned());
        }
        match self.store.entry_for(statement, peer)? {
            Some(entry) => Ok(Some(
                self.changes.entries.get(&entry.id).cloned().unwrap_or(entry),
            )),
            None => Ok(None),
        }
    }

    /// Allocate an id for a new ledger entry.
    pub fn next_entry_id(&mut self) -> Result<EntryId> {
        Ok(EntryId(Self::allocate(
            self.store,
            &mut self.next.entry,
            Table::Entries,
        )?))
    }

    /// Stage a statement write.
    pub fn put_statement(&mut self, statement: Statement) {
        self.changes.statements.insert(statement.id, statement);
    }

    /// Stage a ledger entry write.
    pub fn put_entry(&mut self, entry: LedgerEntry) {
        self.new_entries
            .entry((entry.statement, entry.peer))
            .or_insert(entry.id);
        self.changes.entries.insert(entry.id, entry);
    }

    /// Atomically write everything staged, then release the writer lock.
    pub fn commit(self) -> Result<()> {
        self.store.commit(self.changes)
    }
}
