//! Identity derivation, signatures and sealed-box encryption.
//!
//! Every long-lived identity is an Ed25519 keypair. Offline messages are
//! sealed to the recipient's identity key and signed by the sender's.

pub mod identity;
pub mod sealed;

pub use identity::{verify_signature, PeerId, PEER_ID_SIZE};
pub use sealed::{encrypt_for_peer, open_sealed, seal_for, SEALED_OVERHEAD};
