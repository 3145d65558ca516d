//! Signatures over wire operations.
//!
//! The ledger itself trusts its callers to verify; this module is the
//! boundary they use. Signatures are ed25519 over [`canonical_bytes`].

use crate::error::{Error, Result};
use crate::models::{SignedOperation, WireOperation};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Domain separation prefix for statement operation signatures.
pub const SIGNING_DOMAIN: &[u8] = b"tagmesh/statement-op/v1";

fn len_prefix(len: usize) -> Result<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| Error::InvalidInput(format!("field of {} bytes is too long to sign", len)))
}

fn put_len_prefixed(msg: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    msg.extend_from_slice(&len_prefix(bytes.len())?);
    msg.extend_from_slice(bytes);
    Ok(())
}

/// Canonical encoding of a wire operation.
///
/// domain || len(subject) || subject || predicate (u16) || len(object) ||
/// object || operation (u8) || clock (u64) || len(creator) || creator,
/// integers little-endian, lengths u32. Fields longer than `u32::MAX`
/// bytes have no encoding.
pub fn canonical_bytes(op: &WireOperation) -> Result<Vec<u8>> {
    let creator = op.creator_public_key.as_bytes();
    let mut msg = Vec::with_capacity(
        SIGNING_DOMAIN.len() + 4 * 3 + op.subject.len() + op.object.len() + creator.len() + 2 + 1 + 8,
    );
    msg.extend_from_slice(SIGNING_DOMAIN);
    put_len_prefixed(&mut msg, op.subject.as_bytes())?;
    msg.extend_from_slice(&op.predicate.code().to_le_bytes());
    put_len_prefixed(&mut msg, op.object.as_bytes())?;
    msg.push(op.operation.code());
    msg.extend_from_slice(&op.clock.to_le_bytes());
    put_len_prefixed(&mut msg, creator)?;
    Ok(msg)
}

/// Sign a wire operation.
///
/// The operation's creator key should be `signing_key`'s verifying key,
/// otherwise the result will not verify.
pub fn sign(op: &WireOperation, signing_key: &SigningKey) -> Result<Vec<u8>> {
    Ok(signing_key.sign(&canonical_bytes(op)?).to_bytes().to_vec())
}

/// Verify a signature against the operation's creator key.
///
/// Returns false for anything that is not a well-formed ed25519 key and
/// signature, including bootstrap operations, and for operations with no
/// canonical encoding.
pub fn verify(op: &WireOperation, signature: &[u8]) -> bool {
    let key_bytes: [u8; 32] = match op.creator_public_key.as_bytes().try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let verifying_key = match VerifyingKey::from_bytes(&key_bytes) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let signature = match Signature::from_slice(signature) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let msg = match canonical_bytes(op) {
        Ok(msg) => msg,
        Err(_) => return false,
    };

    verifying_key.verify(&msg, &signature).is_ok()
}

impl SignedOperation {
    /// Sign `operation` with `signing_key`.
    pub fn sign(operation: WireOperation, signing_key: &SigningKey) -> Result<Self> {
        let signature = sign(&operation, signing_key)?;
        Ok(Self::new(operation, signature))
    }

    /// Verify the signature against the operation's creator key.
    pub fn verify(&self) -> bool {
        verify(&self.operation, &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OperationKind, Predicate, PublicKey};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn signing_key(seed: u64) -> SigningKey {
        SigningKey::generate(&mut StdRng::seed_from_u64(seed))
    }

    fn op_for(key: &SigningKey) -> WireOperation {
        WireOperation::new(
            "infohash",
            Predicate::HasTag,
            "linux",
            OperationKind::Add,
            1,
            PublicKey::from(&key.verifying_key()),
        )
    }

    #[test]
    fn signed_operation_verifies() {
        let key = signing_key(1);
        let signed = SignedOperation::sign(op_for(&key), &key).unwrap();
        assert_eq!(signed.signature.len(), 64);
        assert!(signed.verify());
    }

    #[test]
    fn tampering_breaks_verification() {
        let key = signing_key(2);
        let signed = SignedOperation::sign(op_for(&key), &key).unwrap();

        let mutations: [fn(&mut WireOperation); 6] = [
            |op| op.subject.push('x'),
            |op| op.predicate = Predicate::HasTitle,
            |op| op.object = "bsd".into(),
            |op| op.operation = OperationKind::Remove,
            |op| op.clock += 1,
            |op| op.creator_public_key = PublicKey::new([7u8; 32]),
        ];

        for (i, mutate) in mutations.iter().enumerate() {
            let mut tampered = signed.clone();
            mutate(&mut tampered.operation);
            assert!(!tampered.verify(), "mutation {} still verifies", i);
        }
    }

    #[test]
    fn wrong_signer_fails() {
        let owner = signing_key(3);
        let forger = signing_key(4);
        let signed = SignedOperation::sign(op_for(&owner), &forger).unwrap();
        assert!(!signed.verify());
    }

    #[test]
    fn malformed_inputs_fail_closed() {
        let key = signing_key(5);
        let op = op_for(&key);
        assert!(!verify(&op, &[]));
        assert!(!verify(&op, &[0u8; 63]));

        let mut bootstrap = op.clone();
        bootstrap.creator_public_key = PublicKey::auto_generated();
        assert!(!verify(&bootstrap, &sign(&op, &key).unwrap()));
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let key = signing_key(6);
        let mut a = op_for(&key);
        a.subject = "ab".into();
        a.object = "c".into();
        let mut b = a.clone();
        b.subject = "a".into();
        b.object = "bc".into();
        assert_ne!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn length_prefix_rejects_oversized_fields() {
        assert_eq!(len_prefix(3).unwrap(), [3, 0, 0, 0]);
        assert_eq!(len_prefix(u32::MAX as usize).unwrap(), [0xff; 4]);
        if let Some(too_long) = (u32::MAX as usize).checked_add(1) {
            assert!(matches!(len_prefix(too_long), Err(Error::InvalidInput(_))));
        }
    }
}
