//! Peer identities.

use serde::{Deserialize, Serialize};

/// Conventional creator key for system-synthesized (bootstrap) operations.
///
/// Not a real ed25519 key: operations attributed to it carry an empty
/// signature and are never gossiped.
pub const AUTO_GENERATED_KEY: &[u8] = b"auto_generated";

/// Store-assigned peer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u64);

/// An opaque public key identifying a peer.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes_vec")] pub Vec<u8>);

impl PublicKey {
    /// Create from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The distinguished identity used for bootstrap statements.
    pub fn auto_generated() -> Self {
        Self(AUTO_GENERATED_KEY.to_vec())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Self)
    }
}

impl From<&ed25519_dalek::VerifyingKey> for PublicKey {
    fn from(key: &ed25519_dalek::VerifyingKey) -> Self {
        Self(key.to_bytes().to_vec())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 hex chars
        let hex = self.to_hex();
        if hex.len() > 8 {
            write!(f, "{}...", &hex[..8])
        } else {
            write!(f, "{}", hex)
        }
    }
}

/// A peer that has authored at least one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Store-assigned identifier
    pub id: PeerId,

    /// Public key (unique)
    pub public_key: PublicKey,

    /// Unix timestamp in milliseconds when the peer was first seen
    pub added_at: u64,
}

impl Peer {
    /// Create a new peer record.
    pub fn new(id: PeerId, public_key: PublicKey, added_at: u64) -> Self {
        Self {
            id,
            public_key,
            added_at,
        }
    }
}

/// Hex-encodes byte vectors in human-readable formats (JSON records),
/// raw bytes otherwise (bincode transfer form).
pub(crate) mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(bytes))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let key = PublicKey::new(vec![1u8, 2, 3, 250]);
        let parsed = PublicKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn display_truncates_long_keys() {
        let key = PublicKey::new([0xabu8; 32]);
        assert_eq!(key.to_string(), "abababab...");
        assert_eq!(PublicKey::new(vec![0x01]).to_string(), "01");
    }

    #[test]
    fn json_record_uses_hex() {
        let peer = Peer::new(PeerId(7), PublicKey::new(vec![0xde, 0xad]), 100);
        let json = serde_json::to_string(&peer).unwrap();
        assert!(json.contains("\"dead\""));
        let parsed: Peer = serde_json::from_str(&json).unwrap();
        assert_eq!(peer, parsed);
    }
}
