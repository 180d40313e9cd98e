//! Content-addressed store abstraction.

use async_trait::async_trait;

use crate::error::InboxResult;
use crate::pointer::ContentId;

/// Abstraction over the content-addressed block store.
#[async_trait]
pub trait ContentStore: Send + Sync + Clone + 'static {
    /// Fetch the bytes stored under `cid`.
    ///
    /// May block for as long as the network needs; callers apply their own
    /// deadline.
    async fn get(&self, cid: &ContentId) -> InboxResult<Vec<u8>>;

    /// Store `data` and return its identifier.
    async fn add(&self, data: Vec<u8>) -> InboxResult<ContentId>;
}
