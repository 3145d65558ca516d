//! The statement ledger.
//!
//! [`Ledger`] is the entry point for everything above storage: merging
//! operations (remote, local, bootstrap), answering visibility and clock
//! queries, and sampling operations for gossip.

use crate::config::{LedgerConfig, DEFAULT_GOSSIP_ATTEMPTS};
use crate::error::{Error, Result};
use crate::gossip;
use crate::merge::merge_operation;
use crate::models::{
    OperationKind, Predicate, Provenance, PublicKey, SignedOperation, Statement, Triple,
    WireOperation, CLOCK_START_VALUE,
};
use crate::storage::{LedgerStore, MemoryStore, RocksStore};
use crate::txn::Transaction;
use crate::visibility::{Visibility, VisibilityPolicy};
use ed25519_dalek::SigningKey;
use rand::Rng;
use std::cmp::Reverse;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A statement ledger over some storage backend.
pub struct Ledger<S: LedgerStore> {
    store: S,
    writer: Mutex<()>,
    policy: VisibilityPolicy,
    gossip_attempts: usize,
}

impl Ledger<MemoryStore> {
    /// Create an empty ledger held in memory, with default policy.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl Ledger<RocksStore> {
    /// Open the persistent ledger in `config.data_dir`.
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let store = RocksStore::open(&config.data_dir)?;
        Ok(Self::with_config(store, config))
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Create a ledger with the default visibility policy.
    pub fn new(store: S) -> Self {
        Self::with_policy(store, VisibilityPolicy::default())
    }

    /// Create a ledger with a custom visibility policy.
    pub fn with_policy(store: S, policy: VisibilityPolicy) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
            policy,
            gossip_attempts: DEFAULT_GOSSIP_ATTEMPTS,
        }
    }

    /// Create a ledger using the thresholds and gossip budget from `config`.
    pub fn with_config(store: S, config: &LedgerConfig) -> Self {
        let mut ledger = Self::with_policy(store, config.policy());
        ledger.gossip_attempts = config.gossip_attempts;
        ledger
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The visibility policy in use.
    pub fn policy(&self) -> VisibilityPolicy {
        self.policy
    }

    fn begin(&self) -> Result<Transaction<'_, S>> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| Error::Storage("ledger writer lock poisoned".into()))?;
        Ok(Transaction::begin(&self.store, writer))
    }

    // --- Merging ---

    /// Merge an operation whose signature the caller has already verified.
    ///
    /// Returns `Ok(true)` if it was inserted or superseded the creator's
    /// previous claim, `Ok(false)` if it was stale.
    pub fn apply_operation(
        &self,
        op: &WireOperation,
        signature: &[u8],
        provenance: Provenance,
        weight: u32,
    ) -> Result<bool> {
        let mut txn = self.begin()?;
        let applied = merge_operation(&mut txn, op, signature, provenance, weight, now_millis())?;
        if applied {
            txn.commit()?;
        }
        Ok(applied)
    }

    /// Verify and merge an operation received from a remote peer.
    pub fn ingest(&self, signed: &SignedOperation) -> Result<bool> {
        if !signed.verify() {
            warn!(
                "Rejected operation with invalid signature from {} on {} {} {}",
                signed.operation.creator_public_key,
                signed.operation.subject,
                signed.operation.predicate,
                signed.operation.object
            );
            return Err(Error::InvalidSignature {
                creator: signed.operation.creator_public_key.to_hex(),
            });
        }
        self.apply_operation(&signed.operation, &signed.signature, Provenance::remote(), 1)
    }

    /// Record a local user's edit, signed by `signer`.
    ///
    /// The clock is one past the signer's stored clock for the statement.
    /// Returns the signed operation for broadcasting.
    pub fn add_local(
        &self,
        signer: &SigningKey,
        subject: &str,
        predicate: Predicate,
        object: &str,
        kind: OperationKind,
    ) -> Result<SignedOperation> {
        let creator = PublicKey::from(&signer.verifying_key());
        let now = now_millis();
        let mut txn = self.begin()?;

        let peer = txn.find_or_insert_peer(&creator, now)?;
        let subject_id = txn.find_or_insert_resource(subject)?.id;
        let object_id = txn.find_or_insert_resource(object)?.id;
        let statement = txn.find_or_insert_statement(Triple::new(subject_id, predicate, object_id))?;
        let clock = txn
            .entry_for(statement.id, peer.id)?
            .map_or(CLOCK_START_VALUE, |entry| entry.clock)
            .checked_add(1)
            .ok_or_else(|| Error::InvalidInput("logical clock exhausted".into()))?;

        let op = WireOperation::new(subject, predicate, object, kind, clock, creator);
        let signed = SignedOperation::sign(op, signer)?;
        merge_operation(
            &mut txn,
            &signed.operation,
            &signed.signature,
            Provenance::local(),
            1,
            now,
        )?;
        txn.commit()?;
        Ok(signed)
    }

    /// Seed a statement with a synthetic vote strong enough to show it.
    ///
    /// The vote is attributed to `identity` (conventionally
    /// [`PublicKey::auto_generated`]) at the start clock, so any real
    /// operation from that identity supersedes it. Seeded entries are never
    /// gossiped.
    pub fn seed_statement(
        &self,
        identity: &PublicKey,
        subject: &str,
        predicate: Predicate,
        object: &str,
    ) -> Result<bool> {
        let op = WireOperation::new(
            subject,
            predicate,
            object,
            OperationKind::Add,
            CLOCK_START_VALUE,
            identity.clone(),
        );
        let applied =
            self.apply_operation(&op, &[], Provenance::auto_generated(), self.policy.seed_weight())?;
        if applied {
            info!("Seeded {} {} {}", subject, predicate, object);
        }
        Ok(applied)
    }

    // --- Queries ---

    /// Look up a statement by names, without creating anything.
    pub fn statement(
        &self,
        subject: &str,
        predicate: Predicate,
        object: &str,
    ) -> Result<Option<Statement>> {
        let Some(subject) = self.store.resource_by_name(subject)? else {
            return Ok(None);
        };
        let Some(object) = self.store.resource_by_name(object)? else {
            return Ok(None);
        };
        self.store
            .statement_by_triple(&Triple::new(subject.id, predicate, object.id))
    }

    /// How a statement is presented under this ledger's policy.
    pub fn visibility(&self, statement: &Statement) -> Visibility {
        self.policy.classify(statement)
    }

    fn statements_with(
        &self,
        subject: &str,
        predicate: Predicate,
        visibility: Visibility,
    ) -> Result<Vec<Statement>> {
        let Some(subject) = self.store.resource_by_name(subject)? else {
            return Ok(Vec::new());
        };
        let mut statements = self.store.statements_with_subject(subject.id, predicate)?;
        statements.retain(|s| self.policy.classify(s) == visibility);
        Ok(statements)
    }

    fn object_names(&self, statements: Vec<Statement>) -> Result<Vec<String>> {
        statements
            .into_iter()
            .map(|s| {
                self.store
                    .resource(s.triple.object)?
                    .map(|r| r.name)
                    .ok_or_else(|| Error::Corrupt(format!("statement {:?} has no object", s.id)))
            })
            .collect()
    }

    /// Objects shown for `subject`, highest score first.
    ///
    /// Unknown subjects have no objects.
    pub fn objects_for(&self, subject: &str, predicate: Predicate) -> Result<Vec<String>> {
        let mut statements = self.statements_with(subject, predicate, Visibility::Shown)?;
        statements.sort_by_key(|s| (Reverse(s.score()), s.id));
        self.object_names(statements)
    }

    /// Objects suggested for `subject`, in statement order.
    pub fn suggestions_for(&self, subject: &str, predicate: Predicate) -> Result<Vec<String>> {
        let statements = self.statements_with(subject, predicate, Visibility::Suggested)?;
        self.object_names(statements)
    }

    /// The stored clock of `creator`'s claim on a statement, or
    /// [`CLOCK_START_VALUE`] if there is none.
    pub fn clock_of(
        &self,
        creator: &PublicKey,
        subject: &str,
        predicate: Predicate,
        object: &str,
    ) -> Result<u64> {
        let Some(peer) = self.store.peer_by_key(creator)? else {
            return Ok(CLOCK_START_VALUE);
        };
        let Some(statement) = self.statement(subject, predicate, object)? else {
            return Ok(CLOCK_START_VALUE);
        };
        Ok(self
            .store
            .entry_for(statement.id, peer.id)?
            .map_or(CLOCK_START_VALUE, |entry| entry.clock))
    }

    // --- Gossip ---

    /// Sample up to `count` operations last updated at or before
    /// `older_than` (unix millis). May return fewer.
    pub fn sample_for_gossip(&self, older_than: u64, count: usize) -> Result<Vec<SignedOperation>> {
        self.sample_for_gossip_with(&mut rand::thread_rng(), older_than, count)
    }

    /// [`Ledger::sample_for_gossip`] with a caller-supplied random source.
    pub fn sample_for_gossip_with<R: Rng>(
        &self,
        rng: &mut R,
        older_than: u64,
        count: usize,
    ) -> Result<Vec<SignedOperation>> {
        gossip::sample_entries(&self.store, rng, older_than, count, self.gossip_attempts)?
            .iter()
            .map(|entry| gossip::resolve(&self.store, entry))
            .collect()
    }

    /// Sample up to `count` operations not updated within the last `max_age`.
    pub fn operations_for_gossip(
        &self,
        max_age: Duration,
        count: usize,
    ) -> Result<Vec<SignedOperation>> {
        let max_age = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        self.sample_for_gossip(now_millis().saturating_sub(max_age), count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Table;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn key(seed: u8) -> PublicKey {
        PublicKey::new(vec![seed; 32])
    }

    fn signing_key(seed: u64) -> SigningKey {
        SigningKey::generate(&mut StdRng::seed_from_u64(seed))
    }

    fn vote(ledger: &Ledger<MemoryStore>, peer: u8, object: &str, kind: OperationKind, clock: u64) {
        let op = WireOperation::new("infohash", Predicate::HasTag, object, kind, clock, key(peer));
        assert!(ledger
            .apply_operation(&op, b"sig", Provenance::remote(), 1)
            .unwrap());
    }

    #[test]
    fn ledger_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Ledger<MemoryStore>>();
        assert_send_sync::<Ledger<RocksStore>>();
    }

    #[test]
    fn visibility_follows_score() {
        let ledger = Ledger::in_memory();
        // linux: +2, ubuntu: +1, debian: 0, arch: -1, bsd: -2
        vote(&ledger, 1, "linux", OperationKind::Add, 1);
        vote(&ledger, 2, "linux", OperationKind::Add, 1);
        vote(&ledger, 1, "ubuntu", OperationKind::Add, 1);
        vote(&ledger, 1, "debian", OperationKind::Add, 1);
        vote(&ledger, 2, "debian", OperationKind::Remove, 1);
        vote(&ledger, 1, "arch", OperationKind::Remove, 1);
        vote(&ledger, 1, "bsd", OperationKind::Remove, 1);
        vote(&ledger, 2, "bsd", OperationKind::Remove, 1);

        assert_eq!(
            ledger.objects_for("infohash", Predicate::HasTag).unwrap(),
            vec!["linux", "ubuntu"]
        );
        assert_eq!(
            ledger.suggestions_for("infohash", Predicate::HasTag).unwrap(),
            vec!["debian", "arch"]
        );
        assert!(ledger
            .objects_for("infohash", Predicate::HasTitle)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn objects_ordered_by_score_then_id() {
        let ledger = Ledger::in_memory();
        vote(&ledger, 1, "b", OperationKind::Add, 1);
        vote(&ledger, 1, "a", OperationKind::Add, 1);
        vote(&ledger, 1, "c", OperationKind::Add, 1);
        vote(&ledger, 2, "c", OperationKind::Add, 1);

        assert_eq!(
            ledger.objects_for("infohash", Predicate::HasTag).unwrap(),
            vec!["c", "b", "a"]
        );
    }

    #[test]
    fn local_votes_override_score() {
        let ledger = Ledger::in_memory();
        let me = signing_key(1);

        // Downvoted by others but added locally
        vote(&ledger, 1, "linux", OperationKind::Remove, 1);
        vote(&ledger, 2, "linux", OperationKind::Remove, 1);
        vote(&ledger, 3, "linux", OperationKind::Remove, 1);
        ledger
            .add_local(&me, "infohash", Predicate::HasTag, "linux", OperationKind::Add)
            .unwrap();
        assert_eq!(
            ledger.objects_for("infohash", Predicate::HasTag).unwrap(),
            vec!["linux"]
        );

        // Upvoted by others but removed locally
        vote(&ledger, 1, "windows", OperationKind::Add, 1);
        vote(&ledger, 2, "windows", OperationKind::Add, 1);
        ledger
            .add_local(&me, "infohash", Predicate::HasTag, "windows", OperationKind::Remove)
            .unwrap();
        let objects = ledger.objects_for("infohash", Predicate::HasTag).unwrap();
        assert!(!objects.contains(&"windows".to_string()));
        assert!(ledger
            .suggestions_for("infohash", Predicate::HasTag)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unknown_subject_is_empty() {
        let ledger = Ledger::in_memory();
        assert!(ledger.objects_for("nothing", Predicate::HasTag).unwrap().is_empty());
        assert!(ledger
            .suggestions_for("nothing", Predicate::HasTag)
            .unwrap()
            .is_empty());
        assert!(ledger.statement("nothing", Predicate::HasTag, "x").unwrap().is_none());
        assert_eq!(ledger.store().count(Table::Resources).unwrap(), 0);
    }

    #[test]
    fn clock_of_defaults_without_creating_records() {
        let ledger = Ledger::in_memory();
        assert_eq!(
            ledger.clock_of(&key(1), "infohash", Predicate::HasTag, "linux").unwrap(),
            CLOCK_START_VALUE
        );

        vote(&ledger, 1, "linux", OperationKind::Add, 4);
        // Known peer, unknown statement
        assert_eq!(ledger.clock_of(&key(1), "infohash", Predicate::HasTag, "bsd").unwrap(), 0);
        // Known statement, unknown peer
        assert_eq!(ledger.clock_of(&key(2), "infohash", Predicate::HasTag, "linux").unwrap(), 0);
        // Known statement, other predicate
        assert_eq!(ledger.clock_of(&key(1), "infohash", Predicate::HasTitle, "linux").unwrap(), 0);
        assert_eq!(ledger.clock_of(&key(1), "infohash", Predicate::HasTag, "linux").unwrap(), 4);

        assert_eq!(ledger.store().count(Table::Peers).unwrap(), 1);
        assert_eq!(ledger.store().count(Table::Statements).unwrap(), 1);
    }

    #[test]
    fn add_local_advances_the_clock_and_signs() {
        let ledger = Ledger::in_memory();
        let me = signing_key(2);
        let creator = PublicKey::from(&me.verifying_key());

        let first = ledger
            .add_local(&me, "infohash", Predicate::HasTag, "linux", OperationKind::Add)
            .unwrap();
        assert_eq!(first.operation.clock, 1);
        assert!(first.verify());

        let second = ledger
            .add_local(&me, "infohash", Predicate::HasTag, "linux", OperationKind::Remove)
            .unwrap();
        assert_eq!(second.operation.clock, 2);
        assert_eq!(
            ledger.clock_of(&creator, "infohash", Predicate::HasTag, "linux").unwrap(),
            2
        );

        let s = ledger.statement("infohash", Predicate::HasTag, "linux").unwrap().unwrap();
        assert_eq!((s.added_count, s.removed_count), (0, 1));
        assert_eq!(s.local_operation, Some(OperationKind::Remove));
        assert_eq!(ledger.visibility(&s), Visibility::Hidden);
    }

    #[test]
    fn ingest_verifies_before_merging() {
        let origin = Ledger::in_memory();
        let replica = Ledger::in_memory();
        let author = signing_key(3);

        let signed = origin
            .add_local(&author, "infohash", Predicate::HasTag, "linux", OperationKind::Add)
            .unwrap();
        assert!(replica.ingest(&signed).unwrap());
        assert!(!replica.ingest(&signed).unwrap());

        let s = replica.statement("infohash", Predicate::HasTag, "linux").unwrap().unwrap();
        assert_eq!(s.added_count, 1);
        assert_eq!(s.local_operation, None);

        let mut forged = signed.clone();
        forged.operation.object = "windows".into();
        forged.operation.clock = 9;
        assert!(matches!(
            replica.ingest(&forged),
            Err(Error::InvalidSignature { .. })
        ));
        assert!(replica.statement("infohash", Predicate::HasTag, "windows").unwrap().is_none());
    }

    #[test]
    fn seeded_statements_are_shown_and_never_gossiped() {
        let ledger = Ledger::in_memory();
        let bootstrap = PublicKey::auto_generated();

        assert!(ledger
            .seed_statement(&bootstrap, "infohash", Predicate::HasTag, "linux")
            .unwrap());
        assert!(!ledger
            .seed_statement(&bootstrap, "infohash", Predicate::HasTag, "linux")
            .unwrap());
        assert_eq!(
            ledger.objects_for("infohash", Predicate::HasTag).unwrap(),
            vec!["linux"]
        );

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert!(ledger
                .sample_for_gossip_with(&mut rng, u64::MAX, 10)
                .unwrap()
                .is_empty());
        }
    }

    #[test]
    fn seed_weight_follows_the_show_threshold() {
        let ledger = Ledger::with_policy(MemoryStore::new(), VisibilityPolicy::new(3, -2));
        ledger
            .seed_statement(&PublicKey::auto_generated(), "infohash", Predicate::HasTag, "linux")
            .unwrap();
        let s = ledger.statement("infohash", Predicate::HasTag, "linux").unwrap().unwrap();
        assert_eq!(s.added_count, 3);
        assert_eq!(ledger.visibility(&s), Visibility::Shown);
    }

    #[test]
    fn gossip_sample_resolves_signed_operations() {
        let origin = Ledger::in_memory();
        let replica = Ledger::in_memory();
        let author = signing_key(4);

        for tag in ["linux", "ubuntu", "debian"] {
            origin
                .add_local(&author, "infohash", Predicate::HasTag, tag, OperationKind::Add)
                .unwrap();
        }
        origin
            .seed_statement(&PublicKey::auto_generated(), "infohash", Predicate::HasTag, "iso")
            .unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        let sample = origin.sample_for_gossip_with(&mut rng, u64::MAX, 10).unwrap();
        assert_eq!(sample.len(), 3);
        for signed in &sample {
            assert!(signed.verify());
            assert!(replica.ingest(signed).unwrap());
        }
        assert_eq!(
            replica.objects_for("infohash", Predicate::HasTag).unwrap().len(),
            3
        );
    }

    #[test]
    fn gossip_sample_respects_age() {
        let ledger = Ledger::in_memory();
        vote(&ledger, 1, "linux", OperationKind::Add, 1);

        let mut rng = StdRng::seed_from_u64(6);
        assert!(ledger.sample_for_gossip_with(&mut rng, 0, 10).unwrap().is_empty());
        assert!(ledger
            .operations_for_gossip(Duration::from_secs(3600), 10)
            .unwrap()
            .is_empty());
        assert_eq!(ledger.operations_for_gossip(Duration::ZERO, 10).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_merges_conserve_counters() {
        let ledger = std::sync::Arc::new(Ledger::in_memory());
        let handles: Vec<_> = (0..8u8)
            .map(|peer| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for clock in 1..=20u64 {
                        let kind = if clock % 2 == 0 {
                            OperationKind::Add
                        } else {
                            OperationKind::Remove
                        };
                        let op = WireOperation::new(
                            "infohash",
                            Predicate::HasTag,
                            "linux",
                            kind,
                            clock,
                            key(peer),
                        );
                        ledger
                            .apply_operation(&op, b"sig", Provenance::remote(), 1)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let s = ledger.statement("infohash", Predicate::HasTag, "linux").unwrap().unwrap();
        assert_eq!((s.added_count, s.removed_count), (8, 0));
        assert_eq!(ledger.store().count(Table::Entries).unwrap(), 8);
        assert_eq!(ledger.store().count(Table::Statements).unwrap(), 1);
    }

    #[test]
    fn rocks_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig {
            data_dir: dir.path().join("ledger"),
            ..LedgerConfig::default()
        };
        let author = signing_key(8);
        let creator = PublicKey::from(&author.verifying_key());

        {
            let ledger = Ledger::open(&config).unwrap();
            ledger
                .add_local(&author, "infohash", Predicate::HasTag, "linux", OperationKind::Add)
                .unwrap();
            ledger
                .add_local(&author, "infohash", Predicate::HasTag, "linux", OperationKind::Add)
                .unwrap();
            ledger
                .seed_statement(&PublicKey::auto_generated(), "infohash", Predicate::HasTag, "iso")
                .unwrap();
        }

        let ledger = Ledger::open(&config).unwrap();
        assert_eq!(
            ledger.clock_of(&creator, "infohash", Predicate::HasTag, "linux").unwrap(),
            2
        );
        assert_eq!(
            ledger.objects_for("infohash", Predicate::HasTag).unwrap(),
            vec!["linux", "iso"]
        );

        let signed = ledger
            .add_local(&author, "infohash", Predicate::HasTag, "ubuntu", OperationKind::Add)
            .unwrap();
        assert_eq!(signed.operation.clock, 1);
        assert_eq!(ledger.store().count(Table::Entries).unwrap(), 3);
    }
}
