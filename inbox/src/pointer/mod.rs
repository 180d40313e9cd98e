//! DHT pointers advertising where pending messages can be fetched.
//!
//! A [`Pointer`] is published under a [`Locator`] derived from the
//! recipient's identity. Lookups use the locator truncated to a shared
//! prefix so that several recipients land in the same DHT neighbourhood;
//! a recipient therefore sees (and fails to decrypt) other people's mail.

pub mod directory;
pub mod republisher;

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{MAX_POINTER_RECORD_SIZE, MAX_PREFIX_LEN};
use crate::crypto::PeerId;
use crate::error::{InboxError, InboxResult};
use crate::util::{cbor_from_limited_reader, cbor_to_vec};

pub use directory::PointerDirectory;
pub use republisher::PointerRepublisher;

/// Domain separator for locator derivation.
const LOCATOR_DOMAIN: &[u8] = b"market-inbox/locator/v1";

/// Deterministic 256-bit DHT lookup key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator([u8; 32]);

impl Locator {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Locator under which pointers for `recipient` are published.
    pub fn for_recipient(recipient: &PeerId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(LOCATOR_DOMAIN);
        hasher.update(recipient.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Keep the first `prefix_len` bits and zero the rest.
    ///
    /// This is the key actually used on the DHT; every recipient whose
    /// locator shares the prefix shares the bucket.
    pub fn prefixed(&self, prefix_len: u16) -> InboxResult<Self> {
        if prefix_len > MAX_PREFIX_LEN {
            return Err(InboxError::Config(format!(
                "Prefix length {prefix_len} exceeds {MAX_PREFIX_LEN} bits"
            )));
        }
        let mut out = [0u8; 32];
        let full_bytes = usize::from(prefix_len / 8);
        let rem_bits = prefix_len % 8;
        out[..full_bytes].copy_from_slice(&self.0[..full_bytes]);
        if rem_bits > 0 {
            let mask = 0xFFu8 << (8 - rem_bits);
            out[full_bytes] = self.0[full_bytes] & mask;
        }
        Ok(Self(out))
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// What a pointer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Purpose {
    /// Pending offline message for the recipient.
    Message = 1,
    /// Advertises this node as a moderator.
    Moderator = 2,
    /// Listing tag index entry.
    Tag = 3,
}

impl Purpose {
    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> InboxResult<Self> {
        match tag {
            1 => Ok(Self::Message),
            2 => Ok(Self::Moderator),
            3 => Ok(Self::Tag),
            other => Err(InboxError::Serialization(format!(
                "Unknown pointer purpose tag {other}"
            ))),
        }
    }
}

/// A DHT record advertising retrieval addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    /// Identity the pointer is published under. Acknowledgements for
    /// content fetched through this pointer are addressed here.
    pub id: PeerId,
    /// Full (untruncated) locator of the recipient.
    pub locator: Locator,
    pub purpose: Purpose,
    /// Ordered address strings, see [`Address::parse`].
    pub addresses: Vec<String>,
    pub ttl_secs: u64,
    pub published_at: u64,
}

impl Pointer {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.published_at.saturating_add(self.ttl_secs)
    }

    pub fn to_bytes(&self) -> InboxResult<Vec<u8>> {
        cbor_to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> InboxResult<Self> {
        cbor_from_limited_reader(data, MAX_POINTER_RECORD_SIZE)
    }
}

/// Content identifier in the content-addressed store (SHA-256 digest).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId([u8; 32]);

impl ContentId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Identifier of `data`.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> InboxResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| InboxError::InvalidAddress(format!("Bad content id {s}: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| InboxError::InvalidAddress(format!("Bad content id length: {s}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

const CONTENT_PROTOCOL: &str = "ipfs";
const MIRROR_PROTOCOL: &str = "https";

/// A parsed retrieval address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `/ipfs/<cid>`: fetch from the content-addressed store.
    Content(ContentId),
    /// `/ipfs/<cid>/https/<host>/<path>`: fetch from an HTTPS mirror that is
    /// trusted to serve the bytes behind `cid`. Nothing here checks that it
    /// does; the envelope signature is the integrity check.
    Mirrored { cid: ContentId, url: String },
}

impl Address {
    /// Parse an address string.
    ///
    /// Returns `None` for shapes this build does not understand; those are
    /// skipped so that newer peers can advertise new transports.
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix('/')?;
        let mut parts = rest.splitn(4, '/');
        if parts.next()? != CONTENT_PROTOCOL {
            return None;
        }
        let cid = ContentId::from_hex(parts.next()?).ok()?;
        match (parts.next(), parts.next()) {
            (None, None) => Some(Self::Content(cid)),
            (Some(MIRROR_PROTOCOL), Some(target)) if !target.is_empty() => Some(Self::Mirrored {
                cid,
                url: format!("https://{target}"),
            }),
            _ => None,
        }
    }

    pub fn content(cid: &ContentId) -> String {
        format!("/{CONTENT_PROTOCOL}/{cid}")
    }

    /// Build a mirrored address. `url` must be an `https://` URL.
    pub fn mirrored(cid: &ContentId, url: &str) -> InboxResult<String> {
        let target = url
            .strip_prefix("https://")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| InboxError::InvalidAddress(format!("Mirror must be https: {url}")))?;
        Ok(format!("/{CONTENT_PROTOCOL}/{cid}/{MIRROR_PROTOCOL}/{target}"))
    }

    pub const fn cid(&self) -> &ContentId {
        match self {
            Self::Content(cid) | Self::Mirrored { cid, .. } => cid,
        }
    }
}
