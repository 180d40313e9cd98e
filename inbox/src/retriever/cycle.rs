//! One scan cycle: scanning, concurrent fetching, draining.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use super::{MessageRetriever, RetrieverInner};
use crate::crypto::PeerId;
use crate::envelope::{authenticate, AuthenticatedEnvelope};
use crate::error::InboxResult;
use crate::pointer::Address;
use crate::traits::{ContentStore, MirrorClient, PointerDht};

/// Counters for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Pointer records yielded by the lookup, duplicates included.
    pub pointers_seen: usize,
    /// Fetch tasks spawned.
    pub spawned: usize,
    /// Addresses already processed by an earlier cycle.
    pub skipped_processed: usize,
    /// Address strings with a shape this build does not understand.
    pub unsupported: usize,
    /// Messages dispatched without a handler error, deferred ones and
    /// types without a registered handler included.
    pub dispatched: usize,
    /// Messages held back until the drain phase.
    pub deferred: usize,
    /// Candidates that failed decryption, parsing or signature checks.
    pub dropped: usize,
    /// Fetches that failed or timed out.
    pub failed: usize,
    /// Messages whose handler returned an error.
    pub handler_errors: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pointers, {} fetched, {} already processed, {} unsupported, \
             {} dispatched ({} deferred), {} dropped, {} failed, {} handler errors",
            self.pointers_seen,
            self.spawned,
            self.skipped_processed,
            self.unsupported,
            self.dispatched,
            self.deferred,
            self.dropped,
            self.failed,
            self.handler_errors,
        )
    }
}

/// Result of one fetch task.
enum FetchOutcome {
    Dispatched,
    Deferred(AuthenticatedEnvelope),
    Dropped,
    Failed,
    HandlerFailed,
}

impl<D: PointerDht, C: ContentStore, M: MirrorClient> MessageRetriever<D, C, M> {
    /// Run one scan cycle to completion.
    ///
    /// Fails only when the lookup cannot be issued; every per-address
    /// problem is logged and counted instead.
    pub async fn run_cycle(&self) -> InboxResult<CycleReport> {
        let inner = &self.inner;
        debug!("Scanning for offline messages for {:?}", inner.peer_id);
        let mut pointers = inner
            .directory
            .find(&inner.peer_id, inner.config.prefix_len)?;

        let pool = Arc::new(Semaphore::new(inner.config.max_concurrent_fetches));
        let mut tasks = JoinSet::new();
        let mut seen = HashSet::new();
        let mut report = CycleReport::default();

        while let Some(pointer) = pointers.next().await {
            report.pointers_seen += 1;
            for raw in &pointer.addresses {
                if !seen.insert(raw.clone()) {
                    continue;
                }
                let Some(address) = Address::parse(raw) else {
                    debug!("Skipping unsupported address {}", raw);
                    report.unsupported += 1;
                    continue;
                };
                match inner.processed.claim(raw) {
                    Ok(true) => {}
                    Ok(false) => {
                        trace!("Address {} already processed", raw);
                        report.skipped_processed += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to mark {} as processed, skipping: {}", raw, e);
                        continue;
                    }
                }

                let worker = self.inner.clone();
                let pool = pool.clone();
                let source = pointer.id;
                tasks.spawn(async move {
                    let Ok(_permit) = pool.acquire_owned().await else {
                        return FetchOutcome::Failed;
                    };
                    worker.process(source, address).await
                });
                report.spawned += 1;
            }
        }

        // Fan-in: deferred envelopes are buffered in completion order.
        let mut deferred = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(FetchOutcome::Dispatched) => report.dispatched += 1,
                Ok(FetchOutcome::Deferred(envelope)) => deferred.push(envelope),
                Ok(FetchOutcome::Dropped) => report.dropped += 1,
                Ok(FetchOutcome::Failed) => report.failed += 1,
                Ok(FetchOutcome::HandlerFailed) => report.handler_errors += 1,
                Err(e) => {
                    error!("Fetch task did not complete: {}", e);
                    report.failed += 1;
                }
            }
        }

        report.deferred = deferred.len();
        for envelope in deferred {
            debug!(
                "Dispatching deferred {:?} from {:?}",
                envelope.kind(),
                envelope.sender
            );
            match inner
                .dispatcher
                .dispatch(&envelope.sender, envelope.message())
                .await
            {
                Ok(()) => report.dispatched += 1,
                Err(e) => {
                    error!(
                        "Handler for deferred {:?} from {} failed: {}",
                        envelope.kind(),
                        envelope.sender,
                        e
                    );
                    report.handler_errors += 1;
                }
            }
        }

        if report.spawned > 0 {
            info!("Retrieved {} offline message candidates", report.spawned);
        }
        Ok(report)
    }
}

impl<D: PointerDht, C: ContentStore, M: MirrorClient> RetrieverInner<D, C, M> {
    /// Fetch, authenticate, acknowledge and (unless deferred) dispatch.
    async fn process(&self, source: PeerId, address: Address) -> FetchOutcome {
        let ciphertext = match self.fetcher.fetch(&address).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to retrieve {:?}: {}", address, e);
                return FetchOutcome::Failed;
            }
        };

        // Most candidates in a shared bucket belong to someone else.
        let envelope = match authenticate(&ciphertext, &self.identity) {
            Ok(envelope) => envelope,
            Err(e) => {
                trace!("Discarding candidate {:?}: {}", address.cid(), e);
                return FetchOutcome::Dropped;
            }
        };

        let kind = envelope.kind();
        if let Err(e) = self
            .dispatcher
            .acknowledge(&source, &envelope.sender, kind)
            .await
        {
            error!("Failed to acknowledge {:?} to {}: {}", kind, source, e);
        }

        if kind.is_deferred() {
            debug!("Deferring {:?} from {:?}", kind, envelope.sender);
            return FetchOutcome::Deferred(envelope);
        }

        match self
            .dispatcher
            .dispatch(&envelope.sender, envelope.message())
            .await
        {
            Ok(()) => FetchOutcome::Dispatched,
            Err(e) => {
                error!(
                    "Handler for {:?} from {} failed: {}",
                    kind, envelope.sender, e
                );
                FetchOutcome::HandlerFailed
            }
        }
    }
}
