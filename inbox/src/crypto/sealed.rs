//! Sealed boxes addressed to a peer's long-lived identity key.
//!
//! The sender generates an ephemeral X25519 key, agrees on a shared secret
//! with the recipient's identity key (converted to Montgomery form), expands
//! it with HKDF-SHA256 and encrypts with AES-256-GCM. Wire layout:
//!
//! ```text
//! ephemeral_public (32) || nonce (12) || ciphertext + tag
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use ed25519_dalek::{SigningKey, VerifyingKey};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

use super::identity::PeerId;
use crate::error::{InboxError, InboxResult};

const EPHEMERAL_LEN: usize = 32;
const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length.
const TAG_LEN: usize = 16;

/// Domain separator for the HKDF expansion.
const SEALED_BOX_INFO: &[u8] = b"market-inbox/sealed-box/v1";

/// Smallest possible sealed box (empty plaintext).
pub const SEALED_OVERHEAD: usize = EPHEMERAL_LEN + NONCE_LEN + TAG_LEN;

fn recipient_x25519(recipient: &VerifyingKey) -> X25519Public {
    X25519Public::from(recipient.to_montgomery().to_bytes())
}

fn derive_key(
    shared: &[u8; 32],
    ephemeral: &X25519Public,
    recipient: &X25519Public,
) -> InboxResult<Zeroizing<[u8; 32]>> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral.as_bytes());
    salt[32..].copy_from_slice(recipient.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(SEALED_BOX_INFO, &mut okm[..])
        .map_err(|e| InboxError::Crypto(format!("HKDF expansion failed: {e}")))?;
    Ok(okm)
}

/// Encrypt `plaintext` so that only the holder of `recipient`'s signing key
/// can open it.
pub fn seal_for(recipient: &VerifyingKey, plaintext: &[u8]) -> InboxResult<Vec<u8>> {
    let recipient_pub = recipient_x25519(recipient);
    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_pub = X25519Public::from(&ephemeral);
    let shared = Zeroizing::new(ephemeral.diffie_hellman(&recipient_pub).to_bytes());

    let key = derive_key(&shared, &ephemeral_pub, &recipient_pub)?;
    let cipher = Aes256Gcm::new((&*key).into());

    let nonce_bytes: [u8; NONCE_LEN] = rand::random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| InboxError::Crypto(format!("Encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(SEALED_OVERHEAD + plaintext.len());
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Encrypt for a peer after checking that `peer_id` really belongs to `key`.
///
/// Refuses to encrypt to a substituted key presented under a trusted
/// identity label.
pub fn encrypt_for_peer(
    peer_id: &PeerId,
    key: &VerifyingKey,
    plaintext: &[u8],
) -> InboxResult<Vec<u8>> {
    if !peer_id.matches_public_key(key) {
        return Err(InboxError::Crypto(format!(
            "Peer public key and id do not match for peer {peer_id}"
        )));
    }
    seal_for(key, plaintext)
}

/// Open a sealed box with our identity signing key.
pub fn open_sealed(ciphertext: &[u8], recipient: &SigningKey) -> InboxResult<Vec<u8>> {
    if ciphertext.len() < SEALED_OVERHEAD {
        return Err(InboxError::Crypto(format!(
            "Sealed box too short: {} bytes",
            ciphertext.len()
        )));
    }
    let (ephemeral_bytes, rest) = ciphertext.split_at(EPHEMERAL_LEN);
    let (nonce_bytes, body) = rest.split_at(NONCE_LEN);

    let mut ephemeral_arr = [0u8; EPHEMERAL_LEN];
    ephemeral_arr.copy_from_slice(ephemeral_bytes);
    let ephemeral_pub = X25519Public::from(ephemeral_arr);

    let secret = StaticSecret::from(recipient.to_scalar_bytes());
    let recipient_pub = X25519Public::from(&secret);
    let shared = Zeroizing::new(secret.diffie_hellman(&ephemeral_pub).to_bytes());

    let key = derive_key(&shared, &ephemeral_pub, &recipient_pub)?;
    let cipher = Aes256Gcm::new((&*key).into());

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), body)
        .map_err(|e| InboxError::Crypto(format!("Decryption failed: {e}")))
}
