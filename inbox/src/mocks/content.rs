//! In-memory content-addressed store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{InboxError, InboxResult};
use crate::pointer::ContentId;
use crate::traits::ContentStore;

#[derive(Debug, Default)]
struct MockContentInner {
    blobs: RwLock<HashMap<ContentId, Vec<u8>>>,
    delays: RwLock<HashMap<ContentId, Duration>>,
    failing: RwLock<HashSet<ContentId>>,
    fetches: RwLock<HashMap<ContentId, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Content store with per-blob latency and failure injection.
#[derive(Debug, Clone, Default)]
pub struct MockContentStore {
    inner: Arc<MockContentInner>,
}

impl MockContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, data: Vec<u8>) -> ContentId {
        let cid = ContentId::of(&data);
        self.inner.blobs.write().await.insert(cid, data);
        cid
    }

    pub async fn get_stored(&self, cid: &ContentId) -> Option<Vec<u8>> {
        self.inner.blobs.read().await.get(cid).cloned()
    }

    /// Make fetches of `cid` take `delay`.
    pub async fn set_delay(&self, cid: &ContentId, delay: Duration) {
        self.inner.delays.write().await.insert(*cid, delay);
    }

    /// Make fetches of `cid` fail with a transport error.
    pub async fn set_failing(&self, cid: &ContentId) {
        self.inner.failing.write().await.insert(*cid);
    }

    pub async fn fetch_count(&self, cid: &ContentId) -> usize {
        self.inner
            .fetches
            .read()
            .await
            .get(cid)
            .copied()
            .unwrap_or(0)
    }

    pub async fn total_fetches(&self) -> usize {
        self.inner.fetches.read().await.values().sum()
    }

    /// Highest number of concurrent `get` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.inner.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn lookup(&self, cid: &ContentId) -> InboxResult<Vec<u8>> {
        let delay = self.inner.delays.read().await.get(cid).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.inner.failing.read().await.contains(cid) {
            return Err(InboxError::Transport(format!(
                "MockContentStore: simulated failure for {cid}"
            )));
        }
        self.get_stored(cid)
            .await
            .ok_or_else(|| InboxError::NotFound(format!("content {cid}")))
    }
}

#[async_trait]
impl ContentStore for MockContentStore {
    async fn get(&self, cid: &ContentId) -> InboxResult<Vec<u8>> {
        *self.inner.fetches.write().await.entry(*cid).or_default() += 1;
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.lookup(cid).await;
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn add(&self, data: Vec<u8>) -> InboxResult<ContentId> {
        Ok(self.insert(data).await)
    }
}
