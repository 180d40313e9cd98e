//! Peer identities derived from Ed25519 public keys.

use std::fmt;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{InboxError, InboxResult};

/// Size of a peer identity in bytes.
pub const PEER_ID_SIZE: usize = 32;

/// Canonical identity of a peer: SHA-256 over its Ed25519 verifying key.
///
/// The identity of an envelope's sender is always recomputed from the key
/// carried in the envelope, never taken from where the bytes came from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId([u8; PEER_ID_SIZE]);

impl PeerId {
    pub const fn from_bytes(bytes: [u8; PEER_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; PEER_ID_SIZE] {
        &self.0
    }

    /// Derive the identity belonging to a public key.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        Self(Sha256::digest(key.as_bytes()).into())
    }

    /// Derive an identity from raw public key bytes, rejecting invalid points.
    pub fn from_public_key_bytes(bytes: &[u8; 32]) -> InboxResult<Self> {
        let key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| InboxError::Crypto(format!("Invalid public key: {e}")))?;
        Ok(Self::from_public_key(&key))
    }

    /// Whether `key` is the key this identity was derived from.
    pub fn matches_public_key(&self, key: &VerifyingKey) -> bool {
        let derived = Self::from_public_key(key);
        self.0[..].ct_eq(&derived.0[..]).into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> InboxResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| InboxError::Serialization(format!("Invalid peer id hex: {e}")))?;
        let bytes: [u8; PEER_ID_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            InboxError::Serialization(format!(
                "Invalid peer id length: expected {PEER_ID_SIZE}, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &self.to_hex()[..16])
    }
}

/// Verify an Ed25519 signature over `data`.
///
/// Returns `false` for malformed keys or signatures as well as for a plain
/// mismatch; callers only care whether the envelope can be trusted.
pub fn verify_signature(data: &[u8], signature: &[u8], public_key: &[u8; 32]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    key.verify(data, &Signature::from_bytes(&sig_bytes)).is_ok()
}
