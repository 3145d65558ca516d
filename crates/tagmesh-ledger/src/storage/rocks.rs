//! Persistent ledger storage using RocksDB.
//!
//! Records are JSON values under short string prefixes followed by
//! big-endian ids, so prefix scans come back in id order:
//!
//! ```text
//! peer:{id}                  -> Peer
//! peer_key:{public key}      -> id
//! resource:{id}              -> Resource
//! resource_name:{name}       -> id
//! statement:{id}             -> Statement
//! triple:{s}{p}{o}           -> id
//! subject:{s}{p}{id}         -> ()       (statements by subject + predicate)
//! entry:{id}                 -> LedgerEntry
//! entry_for:{statement}{peer} -> id
//! count:{table}              -> u64
//! node:signing_key           -> ed25519 secret key
//! ```

use super::{ChangeSet, LedgerStore, Table};
use crate::error::{Error, Result};
use crate::models::{
    EntryId, LedgerEntry, Peer, PeerId, Predicate, PublicKey, Resource, ResourceId, Statement,
    StatementId, Triple,
};
use ed25519_dalek::SigningKey;
use rocksdb::{Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Mutex;

const PEER: &[u8] = b"peer:";
const PEER_KEY: &[u8] = b"peer_key:";
const RESOURCE: &[u8] = b"resource:";
const RESOURCE_NAME: &[u8] = b"resource_name:";
const STATEMENT: &[u8] = b"statement:";
const TRIPLE: &[u8] = b"triple:";
const SUBJECT: &[u8] = b"subject:";
const ENTRY: &[u8] = b"entry:";
const ENTRY_FOR: &[u8] = b"entry_for:";
const NODE_KEY: &[u8] = b"node:signing_key";

fn key(prefix: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let len = prefix.len() + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.extend_from_slice(prefix);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

fn count_key(table: Table) -> &'static [u8] {
    match table {
        Table::Peers => b"count:peers",
        Table::Resources => b"count:resources",
        Table::Statements => b"count:statements",
        Table::Entries => b"count:entries",
    }
}

fn triple_key(triple: &Triple) -> Vec<u8> {
    key(
        TRIPLE,
        &[
            &triple.subject.0.to_be_bytes(),
            &triple.predicate.code().to_be_bytes(),
            &triple.object.0.to_be_bytes(),
        ],
    )
}

fn subject_prefix(subject: ResourceId, predicate: Predicate) -> Vec<u8> {
    key(
        SUBJECT,
        &[&subject.0.to_be_bytes(), &predicate.code().to_be_bytes()],
    )
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Corrupt(format!("expected 8-byte id, got {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

/// RocksDB-backed ledger storage.
pub struct RocksStore {
    db: DB,
    node_key_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path.as_ref())?;
        tracing::info!("Opened ledger store at {:?}", path.as_ref());
        Ok(Self {
            db,
            node_key_lock: Mutex::new(()),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.db.get(key)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn get_id(&self, key: &[u8]) -> Result<Option<u64>> {
        match self.db.get_pinned(key)? {
            Some(data) => Ok(Some(decode_u64(&data)?)),
            None => Ok(None),
        }
    }

    // --- Node Identity ---

    /// Get or create the node's signing key (persistent identity).
    ///
    /// Concurrent first calls all get the one key that was persisted.
    pub fn get_or_create_node_key(&self) -> Result<SigningKey> {
        let _guard = self
            .node_key_lock
            .lock()
            .map_err(|_| Error::Storage("node key lock poisoned".into()))?;

        if let Some(data) = self.db.get(NODE_KEY)? {
            // Load existing key
            let bytes: [u8; 32] = data
                .as_slice()
                .try_into()
                .map_err(|_| Error::Storage("Invalid stored key".into()))?;
            Ok(SigningKey::from_bytes(&bytes))
        } else {
            // Generate new key and persist it
            let mut rng = rand::thread_rng();
            let signing_key = SigningKey::generate(&mut rng);
            self.db.put(NODE_KEY, signing_key.as_bytes())?;
            Ok(signing_key)
        }
    }
}

impl LedgerStore for RocksStore {
    fn peer(&self, id: PeerId) -> Result<Option<Peer>> {
        self.get_json(&key(PEER, &[&id.0.to_be_bytes()]))
    }

    fn peer_by_key(&self, public_key: &PublicKey) -> Result<Option<Peer>> {
        match self.get_id(&key(PEER_KEY, &[public_key.as_bytes()]))? {
            Some(id) => self.peer(PeerId(id)),
            None => Ok(None),
        }
    }

    fn resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        self.get_json(&key(RESOURCE, &[&id.0.to_be_bytes()]))
    }

    fn resource_by_name(&self, name: &str) -> Result<Option<Resource>> {
        match self.get_id(&key(RESOURCE_NAME, &[name.as_bytes()]))? {
            Some(id) => self.resource(ResourceId(id)),
            None => Ok(None),
        }
    }

    fn statement(&self, id: StatementId) -> Result<Option<Statement>> {
        self.get_json(&key(STATEMENT, &[&id.0.to_be_bytes()]))
    }

    fn statement_by_triple(&self, triple: &Triple) -> Result<Option<Statement>> {
        match self.get_id(&triple_key(triple))? {
            Some(id) => self.statement(StatementId(id)),
            None => Ok(None),
        }
    }

    fn statements_with_subject(
        &self,
        subject: ResourceId,
        predicate: Predicate,
    ) -> Result<Vec<Statement>> {
        let prefix = subject_prefix(subject, predicate);
        let mut statements = Vec::new();

        let iter = self.db.prefix_iterator(&prefix);
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let id = StatementId(decode_u64(&key[prefix.len()..])?);
            let statement = self.statement(id)?.ok_or_else(|| {
                Error::Corrupt(format!("subject index names missing statement {}", id.0))
            })?;
            statements.push(statement);
        }

        Ok(statements)
    }

    fn entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        self.get_json(&key(ENTRY, &[&id.0.to_be_bytes()]))
    }

    fn entry_for(&self, statement: StatementId, peer: PeerId) -> Result<Option<LedgerEntry>> {
        let index = key(ENTRY_FOR, &[&statement.0.to_be_bytes(), &peer.0.to_be_bytes()]);
        match self.get_id(&index)? {
            Some(id) => self.entry(EntryId(id)),
            None => Ok(None),
        }
    }

    fn count(&self, table: Table) -> Result<u64> {
        Ok(self.get_id(count_key(table))?.unwrap_or(0))
    }

    fn commit(&self, changes: ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut batch = WriteBatch::default();
        let mut peers = self.count(Table::Peers)?;
        let mut resources = self.count(Table::Resources)?;
        let mut statements = self.count(Table::Statements)?;
        let mut entries = self.count(Table::Entries)?;

        for peer in &changes.peers {
            let id = peer.id.0.to_be_bytes();
            batch.put(key(PEER, &[&id]), serde_json::to_vec(peer)?);
            batch.put(key(PEER_KEY, &[peer.public_key.as_bytes()]), id);
            peers = peers.max(peer.id.0);
        }

        for resource in &changes.resources {
            let id = resource.id.0.to_be_bytes();
            batch.put(key(RESOURCE, &[&id]), serde_json::to_vec(resource)?);
            batch.put(key(RESOURCE_NAME, &[resource.name.as_bytes()]), id);
            resources = resources.max(resource.id.0);
        }

        for (id, statement) in &changes.statements {
            let id_bytes = id.0.to_be_bytes();
            let triple = &statement.triple;
            batch.put(key(STATEMENT, &[&id_bytes]), serde_json::to_vec(statement)?);
            batch.put(triple_key(triple), id_bytes);
            batch.put(
                key(
                    &subject_prefix(triple.subject, triple.predicate),
                    &[&id_bytes],
                ),
                b"",
            );
            statements = statements.max(id.0);
        }

        for (id, entry) in &changes.entries {
            let id_bytes = id.0.to_be_bytes();
            batch.put(key(ENTRY, &[&id_bytes]), serde_json::to_vec(entry)?);
            batch.put(
                key(
                    ENTRY_FOR,
                    &[&entry.statement.0.to_be_bytes(), &entry.peer.0.to_be_bytes()],
                ),
                id_bytes,
            );
            entries = entries.max(id.0);
        }

        batch.put(count_key(Table::Peers), peers.to_be_bytes());
        batch.put(count_key(Table::Resources), resources.to_be_bytes());
        batch.put(count_key(Table::Statements), statements.to_be_bytes());
        batch.put(count_key(Table::Entries), entries.to_be_bytes());

        self.db.write(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OperationKind;
    use tempfile::tempdir;

    fn sample_changes() -> ChangeSet {
        let triple = Triple::new(ResourceId(1), Predicate::HasTag, ResourceId(2));
        let mut statement = Statement::new(StatementId(1), triple);
        statement.added_count = 1;

        let mut changes = ChangeSet::default();
        changes
            .peers
            .push(Peer::new(PeerId(1), PublicKey::new(vec![5u8; 32]), 10));
        changes.resources.push(Resource::new(ResourceId(1), "infohash"));
        changes.resources.push(Resource::new(ResourceId(2), "linux"));
        changes.statements.insert(StatementId(1), statement);
        changes.entries.insert(
            EntryId(1),
            LedgerEntry {
                id: EntryId(1),
                statement: StatementId(1),
                peer: PeerId(1),
                kind: OperationKind::Add,
                clock: 1,
                signature: vec![1, 2, 3],
                updated_at: 10,
                auto_generated: false,
                weight: 1,
            },
        );
        changes
    }

    #[test]
    fn storage_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = RocksStore::open(dir.path()).unwrap();
        storage.commit(sample_changes()).unwrap();

        let peer = storage
            .peer_by_key(&PublicKey::new(vec![5u8; 32]))
            .unwrap()
            .unwrap();
        assert_eq!(peer.id, PeerId(1));

        let linux = storage.resource_by_name("linux").unwrap().unwrap();
        assert_eq!(linux.id, ResourceId(2));

        let statement = storage
            .statement_by_triple(&Triple::new(ResourceId(1), Predicate::HasTag, linux.id))
            .unwrap()
            .unwrap();
        assert_eq!(statement.added_count, 1);

        let entry = storage.entry_for(statement.id, peer.id).unwrap().unwrap();
        assert_eq!(entry.signature, vec![1, 2, 3]);
        assert_eq!(storage.count(Table::Entries).unwrap(), 1);
        assert_eq!(storage.count(Table::Resources).unwrap(), 2);
    }

    #[test]
    fn subject_scan_stays_within_prefix() {
        let dir = tempdir().unwrap();
        let storage = RocksStore::open(dir.path()).unwrap();

        let mut changes = sample_changes();
        changes.resources.push(Resource::new(ResourceId(3), "other"));
        changes.statements.insert(
            StatementId(2),
            Statement::new(
                StatementId(2),
                Triple::new(ResourceId(1), Predicate::HasTitle, ResourceId(3)),
            ),
        );
        changes.statements.insert(
            StatementId(3),
            Statement::new(
                StatementId(3),
                Triple::new(ResourceId(3), Predicate::HasTag, ResourceId(2)),
            ),
        );
        storage.commit(changes).unwrap();

        let tags = storage
            .statements_with_subject(ResourceId(1), Predicate::HasTag)
            .unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, StatementId(1));
        assert!(storage
            .statements_with_subject(ResourceId(2), Predicate::HasTag)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let storage = RocksStore::open(dir.path()).unwrap();
            storage.commit(sample_changes()).unwrap();
        }

        let storage = RocksStore::open(dir.path()).unwrap();
        assert_eq!(storage.count(Table::Statements).unwrap(), 1);
        assert!(storage.entry(EntryId(1)).unwrap().is_some());
    }

    #[test]
    fn node_key_is_persistent() {
        let dir = tempdir().unwrap();
        let storage = RocksStore::open(dir.path()).unwrap();

        let first = storage.get_or_create_node_key().unwrap();
        let second = storage.get_or_create_node_key().unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn concurrent_first_calls_agree_on_the_node_key() {
        let dir = tempdir().unwrap();
        let storage = RocksStore::open(dir.path()).unwrap();

        let keys: Vec<[u8; 32]> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| storage.get_or_create_node_key().unwrap().to_bytes()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let stored = storage.get_or_create_node_key().unwrap().to_bytes();
        for key in keys {
            assert_eq!(key, stored);
        }
    }
}
