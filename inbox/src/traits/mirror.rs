//! HTTPS mirror client abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{MAX_CIPHERTEXT_SIZE, MIRROR_FETCH_TIMEOUT_SECS};
use crate::error::{InboxError, InboxResult};

/// Fetches ciphertext from an HTTPS mirror of the content store.
#[async_trait]
pub trait MirrorClient: Send + Sync + Clone + 'static {
    async fn get(&self, url: &str) -> InboxResult<Vec<u8>>;
}

/// Production mirror client backed by `reqwest`.
#[derive(Clone)]
pub struct HttpsMirror {
    client: reqwest::Client,
}

/// Accumulates a response body, failing once it grows past `cap`.
struct CappedBody {
    buf: Vec<u8>,
    cap: usize,
}

impl CappedBody {
    fn new(url: &str, declared: Option<u64>, cap: usize) -> InboxResult<Self> {
        if let Some(len) = declared {
            if len > cap as u64 {
                return Err(InboxError::Transport(format!(
                    "GET {url} declares {len} bytes (limit {cap})"
                )));
            }
        }
        Ok(Self {
            buf: Vec::new(),
            cap,
        })
    }

    fn push(&mut self, url: &str, chunk: &[u8]) -> InboxResult<()> {
        if self.buf.len() + chunk.len() > self.cap {
            return Err(InboxError::Transport(format!(
                "GET {url} body exceeds {} bytes",
                self.cap
            )));
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }
}

impl HttpsMirror {
    /// Client with the standard mirror timeout.
    pub fn new() -> InboxResult<Self> {
        Self::with_timeout(Duration::from_secs(MIRROR_FETCH_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> InboxResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .https_only(true)
            .build()
            .map_err(|e| InboxError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MirrorClient for HttpsMirror {
    async fn get(&self, url: &str) -> InboxResult<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InboxError::Transport(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InboxError::Transport(format!("GET {url} returned {status}")));
        }

        let mut body = CappedBody::new(url, response.content_length(), MAX_CIPHERTEXT_SIZE)?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| InboxError::Transport(format!("Reading body from {url} failed: {e}")))?
        {
            body.push(url, &chunk)?;
        }
        Ok(body.buf)
    }
}
