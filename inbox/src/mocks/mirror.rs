//! In-memory HTTPS mirror.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{InboxError, InboxResult};
use crate::traits::MirrorClient;

#[derive(Debug, Default)]
struct MockMirrorInner {
    routes: RwLock<HashMap<String, (Vec<u8>, Duration)>>,
    log: RwLock<Vec<String>>,
}

/// Mirror serving fixed bodies per URL, with optional latency.
#[derive(Debug, Clone, Default)]
pub struct MockMirror {
    inner: Arc<MockMirrorInner>,
}

impl MockMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn serve(&self, url: &str, body: Vec<u8>) {
        self.serve_with_delay(url, body, Duration::ZERO).await;
    }

    pub async fn serve_with_delay(&self, url: &str, body: Vec<u8>, delay: Duration) {
        self.inner
            .routes
            .write()
            .await
            .insert(url.to_string(), (body, delay));
    }

    /// URLs requested so far, in request order.
    pub async fn fetch_log(&self) -> Vec<String> {
        self.inner.log.read().await.clone()
    }
}

#[async_trait]
impl MirrorClient for MockMirror {
    async fn get(&self, url: &str) -> InboxResult<Vec<u8>> {
        self.inner.log.write().await.push(url.to_string());
        let route = self.inner.routes.read().await.get(url).cloned();
        let Some((body, delay)) = route else {
            return Err(InboxError::Transport(format!("GET {url} returned 404")));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(body)
    }
}
