//! Gossip sampling.
//!
//! Picks a small random batch of ledger entries to push to a peer. The
//! eligible set (old enough, not bootstrap data) may be a sparse slice of a
//! large ledger, so instead of scanning we probe uniformly random entry ids
//! a bounded number of times and keep the hits. Results may be under-full.

use crate::error::{Error, Result};
use crate::models::{EntryId, LedgerEntry, SignedOperation, WireOperation};
use crate::storage::{LedgerStore, Table};
use rand::Rng;
use std::collections::HashSet;
use tracing::trace;

/// Whether an entry may be gossiped.
pub(crate) fn is_eligible(entry: &LedgerEntry, older_than: u64) -> bool {
    !entry.auto_generated && entry.updated_at <= older_than
}

/// Sample up to `count` distinct eligible entries using at most `attempts`
/// random probes.
pub(crate) fn sample_entries<S, R>(
    store: &S,
    rng: &mut R,
    older_than: u64,
    count: usize,
    attempts: usize,
) -> Result<Vec<LedgerEntry>>
where
    S: LedgerStore + ?Sized,
    R: Rng,
{
    let total = store.count(Table::Entries)?;
    if total == 0 || count == 0 {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let mut sampled = Vec::with_capacity(count.min(total as usize));

    for _ in 0..attempts {
        let id = EntryId(rng.gen_range(1..=total));
        if !seen.insert(id) {
            continue;
        }
        if let Some(entry) = store.entry(id)? {
            if is_eligible(&entry, older_than) {
                sampled.push(entry);
                if sampled.len() == count {
                    break;
                }
            }
        }
    }

    trace!(
        "Gossip sample: {} of {} requested from {} entries",
        sampled.len(),
        count,
        total
    );
    Ok(sampled)
}

/// Turn a stored entry back into the signed operation it was built from.
pub(crate) fn resolve<S: LedgerStore + ?Sized>(
    store: &S,
    entry: &LedgerEntry,
) -> Result<SignedOperation> {
    let statement = store
        .statement(entry.statement)?
        .ok_or_else(|| Error::Corrupt(format!("entry {:?} has no statement", entry.id)))?;
    let peer = store
        .peer(entry.peer)?
        .ok_or_else(|| Error::Corrupt(format!("entry {:?} has no peer", entry.id)))?;
    let subject = store
        .resource(statement.triple.subject)?
        .ok_or_else(|| Error::Corrupt(format!("statement {:?} has no subject", statement.id)))?;
    let object = store
        .resource(statement.triple.object)?
        .ok_or_else(|| Error::Corrupt(format!("statement {:?} has no object", statement.id)))?;

    let operation = WireOperation::new(
        subject.name,
        statement.triple.predicate,
        object.name,
        entry.kind,
        entry.clock,
        peer.public_key,
    );
    Ok(SignedOperation::new(operation, entry.signature.clone()))
}
