//! The merge engine.
//!
//! Each peer holds at most one live claim per statement: a last-writer-wins
//! register ordered by the peer's logical clock, never by wall-clock time.
//! Statement counters are the sum of the live claims' weights, kept exact
//! by undoing a claim's contribution before applying its replacement.
//!
//! ```text
//! no entry              -> insert, +weight            applied
//! clock <= stored.clock -> discard                    stale
//! clock >  stored.clock -> -stored.weight, +weight,
//!                          overwrite entry            applied
//! ```

use crate::error::Result;
use crate::models::{LedgerEntry, Provenance, Triple, WireOperation};
use crate::storage::LedgerStore;
use crate::txn::Transaction;
use tracing::debug;

/// Merge one already-verified operation into the ledger.
///
/// Returns true if the operation was inserted or superseded the stored
/// claim, false if it was stale. Stale operations stage no writes.
pub(crate) fn merge_operation<S: LedgerStore + ?Sized>(
    txn: &mut Transaction<'_, S>,
    op: &WireOperation,
    signature: &[u8],
    provenance: Provenance,
    weight: u32,
    now: u64,
) -> Result<bool> {
    let peer = txn.find_or_insert_peer(&op.creator_public_key, now)?;
    let subject = txn.find_or_insert_resource(&op.subject)?;
    let object = txn.find_or_insert_resource(&op.object)?;
    let mut statement =
        txn.find_or_insert_statement(Triple::new(subject.id, op.predicate, object.id))?;

    let entry = match txn.entry_for(statement.id, peer.id)? {
        None => LedgerEntry {
            id: txn.next_entry_id()?,
            statement: statement.id,
            peer: peer.id,
            kind: op.operation,
            clock: op.clock,
            signature: signature.to_vec(),
            updated_at: now,
            auto_generated: provenance.auto_generated,
            weight,
        },
        Some(stored) if op.clock <= stored.clock => {
            debug!(
                "Stale operation from {} on {} {} {} (clock {} <= {})",
                op.creator_public_key, op.subject, op.predicate, op.object, op.clock, stored.clock
            );
            return Ok(false);
        }
        Some(mut stored) => {
            statement.decrement(stored.kind, stored.weight)?;
            stored.kind = op.operation;
            stored.clock = op.clock;
            stored.signature = signature.to_vec();
            stored.updated_at = now;
            stored.auto_generated = provenance.auto_generated;
            stored.weight = weight;
            stored
        }
    };

    statement.increment(op.operation, weight);
    if provenance.local {
        statement.local_operation = Some(op.operation);
    }

    debug!(
        "Applied {:?} from {} on {} {} {} (clock {}, score {})",
        op.operation,
        op.creator_public_key,
        op.subject,
        op.predicate,
        op.object,
        op.clock,
        statement.score()
    );

    txn.put_statement(statement);
    txn.put_entry(entry);
    Ok(true)
}
