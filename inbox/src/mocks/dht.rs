//! In-memory pointer DHT.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::RwLock;

use crate::error::{InboxError, InboxResult};
use crate::pointer::{Locator, Pointer};
use crate::traits::PointerDht;

/// Types of failures that can be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockDhtFailure {
    /// Lookups yield nothing and publishes fail.
    All,
    /// Lookups yield nothing.
    Reads,
    /// Publishes fail.
    Writes,
}

#[derive(Debug, Default)]
struct MockDhtInner {
    records: RwLock<HashMap<Locator, Vec<Pointer>>>,
    fail_mode: RwLock<Option<MockDhtFailure>>,
    /// Yield every record twice, as a churning network does.
    duplicate_results: AtomicBool,
    lookups: AtomicUsize,
}

/// Shared in-memory DHT.
///
/// Clones see the same records, so a sender and a recipient built from
/// clones of one `MockDht` talk to each other.
#[derive(Debug, Clone, Default)]
pub struct MockDht {
    inner: Arc<MockDhtInner>,
}

impl MockDht {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_mode(&self, mode: Option<MockDhtFailure>) {
        *self.inner.fail_mode.write().await = mode;
    }

    pub fn set_duplicate_results(&self, duplicate: bool) {
        self.inner
            .duplicate_results
            .store(duplicate, Ordering::SeqCst);
    }

    /// Store `pointer` under `key` without the replace rule of `publish`.
    pub async fn insert_raw(&self, key: Locator, pointer: Pointer) {
        self.inner
            .records
            .write()
            .await
            .entry(key)
            .or_default()
            .push(pointer);
    }

    pub async fn pointers_at(&self, key: &Locator) -> Vec<Pointer> {
        self.inner
            .records
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of records across all keys.
    pub async fn record_count(&self) -> usize {
        self.inner.records.read().await.values().map(Vec::len).sum()
    }

    pub fn lookup_count(&self) -> usize {
        self.inner.lookups.load(Ordering::SeqCst)
    }

    async fn fails(&self, is_write: bool) -> bool {
        match *self.inner.fail_mode.read().await {
            None => false,
            Some(MockDhtFailure::All) => true,
            Some(MockDhtFailure::Reads) => !is_write,
            Some(MockDhtFailure::Writes) => is_write,
        }
    }
}

#[async_trait]
impl PointerDht for MockDht {
    fn find_providers(&self, key: Locator, _prefix_len: u16) -> BoxStream<'static, Pointer> {
        self.inner.lookups.fetch_add(1, Ordering::SeqCst);
        let dht = self.clone();
        stream::once(async move {
            if dht.fails(false).await {
                return Vec::new();
            }
            let found = dht.pointers_at(&key).await;
            if dht.inner.duplicate_results.load(Ordering::SeqCst) {
                found.iter().chain(found.iter()).cloned().collect()
            } else {
                found
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }

    async fn publish(&self, key: Locator, pointer: Pointer) -> InboxResult<()> {
        if self.fails(true).await {
            return Err(InboxError::Dht("MockDht: simulated publish failure".into()));
        }
        let mut records = self.inner.records.write().await;
        let bucket = records.entry(key).or_default();
        bucket.retain(|p| !(p.id == pointer.id && p.purpose == pointer.purpose));
        bucket.push(pointer);
        Ok(())
    }
}
