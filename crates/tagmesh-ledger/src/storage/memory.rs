//! In-memory ledger storage.

use super::{ChangeSet, LedgerStore, Table};
use crate::error::{Error, Result};
use crate::models::{
    EntryId, LedgerEntry, Peer, PeerId, Predicate, PublicKey, Resource, ResourceId, Statement,
    StatementId, Triple,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Ledger storage held entirely in process memory.
///
/// A commit is applied under the write guard, so readers see all of it or
/// none of it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    peers: BTreeMap<PeerId, Peer>,
    peer_keys: HashMap<PublicKey, PeerId>,

    resources: BTreeMap<ResourceId, Resource>,
    resource_names: HashMap<String, ResourceId>,

    statements: BTreeMap<StatementId, Statement>,
    triples: HashMap<Triple, StatementId>,
    by_subject: BTreeMap<(ResourceId, Predicate), BTreeSet<StatementId>>,

    entries: BTreeMap<EntryId, LedgerEntry>,
    entry_index: HashMap<(StatementId, PeerId), EntryId>,
}

impl MemoryStore {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))
    }
}

impl LedgerStore for MemoryStore {
    fn peer(&self, id: PeerId) -> Result<Option<Peer>> {
        Ok(self.read()?.peers.get(&id).cloned())
    }

    fn peer_by_key(&self, key: &PublicKey) -> Result<Option<Peer>> {
        let tables = self.read()?;
        Ok(tables
            .peer_keys
            .get(key)
            .and_then(|id| tables.peers.get(id))
            .cloned())
    }

    fn resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        Ok(self.read()?.resources.get(&id).cloned())
    }

    fn resource_by_name(&self, name: &str) -> Result<Option<Resource>> {
        let tables = self.read()?;
        Ok(tables
            .resource_names
            .get(name)
            .and_then(|id| tables.resources.get(id))
            .cloned())
    }

    fn statement(&self, id: StatementId) -> Result<Option<Statement>> {
        Ok(self.read()?.statements.get(&id).cloned())
    }

    fn statement_by_triple(&self, triple: &Triple) -> Result<Option<Statement>> {
        let tables = self.read()?;
        Ok(tables
            .triples
            .get(triple)
            .and_then(|id| tables.statements.get(id))
            .cloned())
    }

    fn statements_with_subject(
        &self,
        subject: ResourceId,
        predicate: Predicate,
    ) -> Result<Vec<Statement>> {
        let tables = self.read()?;
        let Some(ids) = tables.by_subject.get(&(subject, predicate)) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| tables.statements.get(id))
            .cloned()
            .collect())
    }

    fn entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        Ok(self.read()?.entries.get(&id).cloned())
    }

    fn entry_for(&self, statement: StatementId, peer: PeerId) -> Result<Option<LedgerEntry>> {
        let tables = self.read()?;
        Ok(tables
            .entry_index
            .get(&(statement, peer))
            .and_then(|id| tables.entries.get(id))
            .cloned())
    }

    fn count(&self, table: Table) -> Result<u64> {
        let tables = self.read()?;
        let len = match table {
            Table::Peers => tables.peers.len(),
            Table::Resources => tables.resources.len(),
            Table::Statements => tables.statements.len(),
            Table::Entries => tables.entries.len(),
        };
        Ok(len as u64)
    }

    fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut tables = self.write()?;

        for peer in changes.peers {
            tables.peer_keys.insert(peer.public_key.clone(), peer.id);
            tables.peers.insert(peer.id, peer);
        }

        for resource in changes.resources {
            tables.resource_names.insert(resource.name.clone(), resource.id);
            tables.resources.insert(resource.id, resource);
        }

        for (id, statement) in changes.statements {
            let triple = statement.triple;
            tables.triples.insert(triple, id);
            tables
                .by_subject
                .entry((triple.subject, triple.predicate))
                .or_default()
                .insert(id);
            tables.statements.insert(id, statement);
        }

        for (id, entry) in changes.entries {
            tables.entry_index.insert((entry.statement, entry.peer), id);
            tables.entries.insert(id, entry);
        }

        Ok(())
    }
}
