//! DHT abstraction for pointer records.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::InboxResult;
use crate::pointer::{Locator, Pointer};

/// Abstraction over the DHT that stores pointer records.
///
/// `key` is always the prefixed locator; records of every recipient in the
/// bucket come back from a lookup.
#[async_trait]
pub trait PointerDht: Send + Sync + Clone + 'static {
    /// Stream the pointers stored under `key`.
    ///
    /// The stream is finite and may yield the same pointer more than once
    /// while the network churns. It cannot be restarted; issue a new lookup.
    fn find_providers(&self, key: Locator, prefix_len: u16) -> BoxStream<'static, Pointer>;

    /// Store `pointer` under `key`, replacing any record with the same
    /// `(id, purpose)` stored there.
    async fn publish(&self, key: Locator, pointer: Pointer) -> InboxResult<()>;
}
