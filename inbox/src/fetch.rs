//! Deadline-bounded retrieval of ciphertext from a parsed address.

use std::future::Future;
use std::time::Duration;

use tracing::trace;

use crate::config::{RetrieverConfig, MAX_CIPHERTEXT_SIZE};
use crate::error::{InboxError, InboxResult};
use crate::pointer::{Address, ContentId};
use crate::traits::{ContentStore, MirrorClient};

/// Fetches ciphertext from the content store or an HTTPS mirror.
#[derive(Clone)]
pub struct TransportFetcher<C: ContentStore, M: MirrorClient> {
    content: C,
    mirror: M,
    content_timeout: Duration,
    mirror_timeout: Duration,
}

async fn with_deadline<F>(what: &str, deadline: Duration, fut: F) -> InboxResult<Vec<u8>>
where
    F: Future<Output = InboxResult<Vec<u8>>>,
{
    let bytes = tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| InboxError::Timeout(format!("{what} after {deadline:?}")))??;
    if bytes.len() > MAX_CIPHERTEXT_SIZE {
        return Err(InboxError::Transport(format!(
            "{what} returned {} bytes (limit {MAX_CIPHERTEXT_SIZE})",
            bytes.len()
        )));
    }
    Ok(bytes)
}

impl<C: ContentStore, M: MirrorClient> TransportFetcher<C, M> {
    pub fn new(content: C, mirror: M, config: &RetrieverConfig) -> Self {
        Self {
            content,
            mirror,
            content_timeout: config.content_fetch_timeout,
            mirror_timeout: config.mirror_fetch_timeout,
        }
    }

    pub async fn fetch_content(&self, cid: &ContentId) -> InboxResult<Vec<u8>> {
        trace!("Fetching {} from content store", cid);
        with_deadline(
            &format!("content fetch {cid}"),
            self.content_timeout,
            self.content.get(cid),
        )
        .await
    }

    pub async fn fetch_mirror(&self, url: &str) -> InboxResult<Vec<u8>> {
        trace!("Fetching {} from mirror", url);
        with_deadline(
            &format!("mirror fetch {url}"),
            self.mirror_timeout,
            self.mirror.get(url),
        )
        .await
    }

    /// Fetch the bytes behind `address` using the transport its shape names.
    pub async fn fetch(&self, address: &Address) -> InboxResult<Vec<u8>> {
        match address {
            Address::Content(cid) => self.fetch_content(cid).await,
            Address::Mirrored { url, .. } => self.fetch_mirror(url).await,
        }
    }
}
