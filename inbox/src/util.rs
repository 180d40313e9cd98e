//! Size-limited serialization helpers shared across the crate.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::MAX_ENVELOPE_SIZE;
use crate::error::{InboxError, InboxResult};

/// The one set of bincode options used for every wire frame.
///
/// Varint integers, little endian, trailing bytes rejected. Signatures are
/// computed over bytes produced with these options, so they must never
/// change without a protocol version bump.
fn wire_options() -> impl Options {
    bincode::options()
        .with_limit(MAX_ENVELOPE_SIZE)
        .with_little_endian()
        .with_varint_encoding()
        .reject_trailing_bytes()
}

/// Serialize with the canonical wire options.
pub(crate) fn bincode_serialize<T: Serialize>(value: &T) -> InboxResult<Vec<u8>> {
    wire_options()
        .serialize(value)
        .map_err(|e| InboxError::Serialization(format!("bincode encode failed: {e}")))
}

/// Deserialize bincode with a size limit to prevent OOM from crafted payloads.
pub(crate) fn bincode_deserialize_limited<T: DeserializeOwned>(data: &[u8]) -> InboxResult<T> {
    wire_options()
        .deserialize(data)
        .map_err(|e| InboxError::Serialization(format!("bincode decode failed: {e}")))
}

/// Serialize to CBOR.
pub(crate) fn cbor_to_vec<T: Serialize>(value: &T) -> InboxResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| InboxError::Serialization(format!("CBOR encode failed: {e}")))?;
    Ok(buf)
}

/// Deserialize CBOR data with a size limit to prevent oversized payloads.
pub(crate) fn cbor_from_limited_reader<T: DeserializeOwned>(
    data: &[u8],
    max_bytes: usize,
) -> InboxResult<T> {
    if data.len() > max_bytes {
        return Err(InboxError::Serialization(format!(
            "CBOR payload too large: {} bytes (max {})",
            data.len(),
            max_bytes
        )));
    }
    ciborium::from_reader(data)
        .map_err(|e| InboxError::Serialization(format!("CBOR decode failed: {e}")))
}
