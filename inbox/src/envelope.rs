//! Signed envelopes and the messages they carry.
//!
//! An [`Envelope`] binds a [`Message`] to the Ed25519 key that signed it.
//! The signature covers the canonical bincode bytes of the message, so the
//! wire options in [`crate::util`] are part of the protocol.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::crypto::{encrypt_for_peer, open_sealed, verify_signature, PeerId};
use crate::error::{InboxError, InboxResult};
use crate::util::{bincode_deserialize_limited, bincode_serialize};

/// Protocol message types.
///
/// The tag space is open: codes this build does not know about decode to
/// [`MessageType::Unknown`] and are ignored by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Ping,
    Chat,
    Follow,
    Unfollow,
    Order,
    OrderReject,
    OrderCancel,
    OrderConfirmation,
    OrderFulfillment,
    OrderCompletion,
    DisputeOpen,
    DisputeUpdate,
    DisputeClose,
    Refund,
    OfflineAck,
    OfflineRelay,
    ModeratorAdd,
    ModeratorRemove,
    Store,
    Block,
    VendorFinalizedPayment,
    Error,
    Unknown(u32),
}

impl MessageType {
    pub const fn code(self) -> u32 {
        match self {
            Self::Ping => 0,
            Self::Chat => 1,
            Self::Follow => 2,
            Self::Unfollow => 3,
            Self::Order => 4,
            Self::OrderReject => 5,
            Self::OrderCancel => 6,
            Self::OrderConfirmation => 7,
            Self::OrderFulfillment => 8,
            Self::OrderCompletion => 9,
            Self::DisputeOpen => 10,
            Self::DisputeUpdate => 11,
            Self::DisputeClose => 12,
            Self::Refund => 13,
            Self::OfflineAck => 14,
            Self::OfflineRelay => 15,
            Self::ModeratorAdd => 16,
            Self::ModeratorRemove => 17,
            Self::Store => 18,
            Self::Block => 19,
            Self::VendorFinalizedPayment => 20,
            Self::Error => 500,
            Self::Unknown(code) => code,
        }
    }

    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Ping,
            1 => Self::Chat,
            2 => Self::Follow,
            3 => Self::Unfollow,
            4 => Self::Order,
            5 => Self::OrderReject,
            6 => Self::OrderCancel,
            7 => Self::OrderConfirmation,
            8 => Self::OrderFulfillment,
            9 => Self::OrderCompletion,
            10 => Self::DisputeOpen,
            11 => Self::DisputeUpdate,
            12 => Self::DisputeClose,
            13 => Self::Refund,
            14 => Self::OfflineAck,
            15 => Self::OfflineRelay,
            16 => Self::ModeratorAdd,
            17 => Self::ModeratorRemove,
            18 => Self::Store,
            19 => Self::Block,
            20 => Self::VendorFinalizedPayment,
            500 => Self::Error,
            other => Self::Unknown(other),
        }
    }

    /// Types that must be applied after everything else fetched in the same
    /// retrieval cycle. A cancellation must never overtake the order it
    /// cancels.
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::OrderCancel)
    }

    /// Receiving this type never produces an acknowledgement.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::OfflineAck)
    }
}

/// A protocol message: numeric type tag plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_type: u32,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(kind: MessageType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            message_type: kind.code(),
            payload: payload.into(),
        }
    }

    pub const fn kind(&self) -> MessageType {
        MessageType::from_code(self.message_type)
    }

    /// Canonical serialization used as signing input.
    pub fn to_canonical_bytes(&self) -> InboxResult<Vec<u8>> {
        bincode_serialize(self)
    }
}

/// Signed container for a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Ed25519 verifying key of the signer.
    pub sender_public_key: [u8; 32],
    pub message: Message,
    /// Ed25519 signature over [`Message::to_canonical_bytes`].
    pub signature: Vec<u8>,
}

impl Envelope {
    /// Sign `message` with `signing_key`.
    pub fn sign(message: Message, signing_key: &SigningKey) -> InboxResult<Self> {
        let signature = signing_key.sign(&message.to_canonical_bytes()?);
        Ok(Self {
            sender_public_key: signing_key.verifying_key().to_bytes(),
            message,
            signature: signature.to_bytes().to_vec(),
        })
    }

    /// Sign `message`, serialize it and encrypt the frame for `recipient`.
    pub fn seal(
        message: Message,
        signing_key: &SigningKey,
        recipient: &PeerId,
        recipient_key: &VerifyingKey,
    ) -> InboxResult<Vec<u8>> {
        let frame = Self::sign(message, signing_key)?.to_bytes()?;
        encrypt_for_peer(recipient, recipient_key, &frame)
    }

    /// Inverse of [`Envelope::seal`]; see [`authenticate`].
    pub fn open(
        ciphertext: &[u8],
        recipient_key: &SigningKey,
    ) -> InboxResult<AuthenticatedEnvelope> {
        authenticate(ciphertext, recipient_key)
    }

    pub fn to_bytes(&self) -> InboxResult<Vec<u8>> {
        bincode_serialize(self)
    }

    /// Decode a plaintext frame.
    pub fn parse(plaintext: &[u8]) -> InboxResult<Self> {
        bincode_deserialize_limited(plaintext)
    }

    /// Check the signature and derive the sender's identity from the key.
    pub fn verify(&self) -> InboxResult<PeerId> {
        let canonical = self.message.to_canonical_bytes()?;
        if !verify_signature(&canonical, &self.signature, &self.sender_public_key) {
            return Err(InboxError::Crypto("Envelope signature invalid".into()));
        }
        PeerId::from_public_key_bytes(&self.sender_public_key)
    }
}

/// An envelope that passed decryption, parsing and signature checks.
#[derive(Debug, Clone)]
pub struct AuthenticatedEnvelope {
    pub sender: PeerId,
    pub envelope: Envelope,
}

impl AuthenticatedEnvelope {
    pub const fn message(&self) -> &Message {
        &self.envelope.message
    }

    pub const fn kind(&self) -> MessageType {
        self.envelope.message.kind()
    }
}

/// Decrypt, parse and verify a fetched ciphertext.
///
/// Every failure is an authentication failure from the caller's point of
/// view; most candidates in a shared bucket are addressed to someone else.
pub fn authenticate(
    ciphertext: &[u8],
    recipient_key: &SigningKey,
) -> InboxResult<AuthenticatedEnvelope> {
    let plaintext = open_sealed(ciphertext, recipient_key)?;
    let envelope = Envelope::parse(&plaintext)?;
    let sender = envelope.verify()?;
    Ok(AuthenticatedEnvelope { sender, envelope })
}
