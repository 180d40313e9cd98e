//! Publish and look up pointer records on the DHT.

use std::sync::Arc;

use futures::stream::BoxStream;
use tracing::{debug, info};

use super::{Locator, Pointer, Purpose};
use crate::crypto::PeerId;
use crate::error::InboxResult;
use crate::storage::PointerStore;
use crate::traits::{Clock, PointerDht};

/// DHT pointer operations for one node.
///
/// Publishing keeps at most one live pointer per `(id, purpose)`: the DHT
/// record is replaced and so is the local bookkeeping row used by the
/// [`PointerRepublisher`](super::PointerRepublisher).
#[derive(Clone)]
pub struct PointerDirectory<D: PointerDht> {
    dht: D,
    store: PointerStore,
    clock: Arc<dyn Clock>,
    owner: PeerId,
    prefix_len: u16,
}

impl<D: PointerDht> PointerDirectory<D> {
    pub fn new(
        dht: D,
        store: PointerStore,
        clock: Arc<dyn Clock>,
        owner: PeerId,
        prefix_len: u16,
    ) -> Self {
        Self {
            dht,
            store,
            clock,
            owner,
            prefix_len,
        }
    }

    pub const fn owner(&self) -> &PeerId {
        &self.owner
    }

    pub const fn prefix_len(&self) -> u16 {
        self.prefix_len
    }

    pub const fn store(&self) -> &PointerStore {
        &self.store
    }

    /// Look up pointers in the bucket of `recipient`.
    ///
    /// Fails only if the lookup key cannot be built. The stream carries every
    /// record in the bucket, including duplicates and other recipients' mail.
    pub fn find(
        &self,
        recipient: &PeerId,
        prefix_len: u16,
    ) -> InboxResult<BoxStream<'static, Pointer>> {
        let key = Locator::for_recipient(recipient).prefixed(prefix_len)?;
        debug!("Looking up pointers under {:?} (prefix {} bits)", key, prefix_len);
        Ok(self.dht.find_providers(key, prefix_len))
    }

    /// Publish a pointer under this node's identity.
    pub async fn publish(
        &self,
        purpose: Purpose,
        locator: Locator,
        ttl_secs: u64,
        address: String,
    ) -> InboxResult<Pointer> {
        self.publish_as(self.owner, purpose, locator, ttl_secs, vec![address])
            .await
    }

    /// Publish a pointer under an explicit pointer identity.
    ///
    /// Used for per-message pointers, where each pending message gets its own
    /// identity so that one message never supersedes another.
    pub async fn publish_as(
        &self,
        id: PeerId,
        purpose: Purpose,
        locator: Locator,
        ttl_secs: u64,
        addresses: Vec<String>,
    ) -> InboxResult<Pointer> {
        let pointer = Pointer {
            id,
            locator,
            purpose,
            addresses,
            ttl_secs,
            published_at: self.clock.now_unix(),
        };
        self.put_pointer(&pointer).await?;
        info!(
            "Published {:?} pointer {} at {:?}",
            purpose, pointer.id, pointer.locator
        );
        Ok(pointer)
    }

    /// Push an existing pointer to the DHT again without touching its
    /// timestamp.
    pub async fn republish(&self, pointer: &Pointer) -> InboxResult<()> {
        let key = pointer.locator.prefixed(self.prefix_len)?;
        self.dht.publish(key, pointer.clone()).await
    }

    /// Forget every locally tracked pointer with `purpose`.
    pub fn delete_all(&self, purpose: Purpose) -> InboxResult<usize> {
        self.store.delete_all(purpose)
    }

    async fn put_pointer(&self, pointer: &Pointer) -> InboxResult<()> {
        let key = pointer.locator.prefixed(self.prefix_len)?;
        self.dht.publish(key, pointer.clone()).await?;
        self.store.put(pointer)
    }
}
