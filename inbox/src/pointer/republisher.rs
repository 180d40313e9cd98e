//! Periodic refresh of the pointers this node has published.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::PointerDirectory;
use crate::config::REPUBLISH_INTERVAL_SECS;
use crate::error::InboxResult;
use crate::traits::{Clock, PointerDht};

/// Outcome of one republish pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepublishReport {
    pub republished: usize,
    pub pruned: usize,
    pub failed: usize,
}

/// Keeps live pointers on the DHT and forgets expired ones.
///
/// DHT records age out on their own; the republisher pushes every
/// non-expired pointer again and drops expired rows from the local table.
pub struct PointerRepublisher<D: PointerDht> {
    directory: PointerDirectory<D>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl<D: PointerDht> PointerRepublisher<D> {
    pub fn new(directory: PointerDirectory<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory,
            clock,
            interval: Duration::from_secs(REPUBLISH_INTERVAL_SECS),
        }
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one pass over the pointer table.
    ///
    /// A failed DHT publish is counted and the pointer kept for the next
    /// pass. Only storage errors abort the pass.
    pub async fn republish_once(&self) -> InboxResult<RepublishReport> {
        let now = self.clock.now_unix();
        let store = self.directory.store();
        let mut report = RepublishReport::default();

        for pointer in store.get_all()? {
            if pointer.is_expired(now) {
                debug!(
                    "Pruning expired {:?} pointer {}",
                    pointer.purpose, pointer.id
                );
                store.delete(&pointer.id, pointer.purpose)?;
                report.pruned += 1;
                continue;
            }
            match self.directory.republish(&pointer).await {
                Ok(()) => report.republished += 1,
                Err(e) => {
                    warn!("Failed to republish pointer {}: {}", pointer.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Pointer republish: {} republished, {} pruned, {} failed",
            report.republished, report.pruned, report.failed
        );
        Ok(report)
    }

    /// Spawn the republish loop. The first pass runs immediately.
    pub fn start(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        info!("Starting pointer republisher (every {:?})", self.interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        info!("Pointer republisher shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.republish_once().await {
                            warn!("Pointer republish pass failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}
