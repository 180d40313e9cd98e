//! Periodic retrieval of offline messages addressed to this node.
//!
//! Each cycle scans the node's DHT bucket, fetches every new address on a
//! bounded worker pool, authenticates what comes back and hands it to the
//! [`MessageDispatcher`]. Deferred-class messages (order cancellations) are
//! held back until every other fetch of the cycle has finished.

mod cycle;
pub mod gate;

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use parking_lot::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RetrieverConfig;
use crate::crypto::PeerId;
use crate::dispatch::MessageDispatcher;
use crate::error::{InboxError, InboxResult};
use crate::fetch::TransportFetcher;
use crate::pointer::PointerDirectory;
use crate::storage::OfflineMessages;
use crate::traits::{ContentStore, MirrorClient, PointerDht};

pub use cycle::CycleReport;
pub use gate::StartupGate;

struct RetrieverInner<D: PointerDht, C: ContentStore, M: MirrorClient> {
    identity: SigningKey,
    peer_id: PeerId,
    directory: PointerDirectory<D>,
    fetcher: TransportFetcher<C, M>,
    dispatcher: MessageDispatcher,
    processed: OfflineMessages,
    config: RetrieverConfig,
    gate: StartupGate,
    shutdown: CancellationToken,
    run_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Offline message retriever for one node identity.
///
/// Cheap to clone; clones share state, the startup gate and the shutdown
/// token.
pub struct MessageRetriever<D: PointerDht, C: ContentStore, M: MirrorClient> {
    inner: Arc<RetrieverInner<D, C, M>>,
}

impl<D: PointerDht, C: ContentStore, M: MirrorClient> Clone for MessageRetriever<D, C, M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: PointerDht, C: ContentStore, M: MirrorClient> MessageRetriever<D, C, M> {
    pub fn new(
        identity: SigningKey,
        directory: PointerDirectory<D>,
        fetcher: TransportFetcher<C, M>,
        processed: OfflineMessages,
        dispatcher: MessageDispatcher,
        config: RetrieverConfig,
    ) -> InboxResult<Self> {
        config.validate()?;
        let peer_id = PeerId::from_public_key(&identity.verifying_key());
        if directory.owner() != &peer_id {
            return Err(InboxError::Config(format!(
                "Pointer directory belongs to {}, not {}",
                directory.owner(),
                peer_id
            )));
        }
        // Lookups and publishes must share one bucket.
        if directory.prefix_len() != config.prefix_len {
            return Err(InboxError::Config(format!(
                "Retriever prefix length {} differs from directory prefix length {}",
                config.prefix_len,
                directory.prefix_len()
            )));
        }
        if dispatcher.table().is_empty() {
            warn!("No message handlers registered; offline messages will only be acknowledged");
        }
        Ok(Self {
            inner: Arc::new(RetrieverInner {
                identity,
                peer_id,
                directory,
                fetcher,
                dispatcher,
                processed,
                config,
                gate: StartupGate::new(),
                shutdown: CancellationToken::new(),
                run_handle: Mutex::new(None),
            }),
        })
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.inner.peer_id
    }

    pub fn gate(&self) -> &StartupGate {
        &self.inner.gate
    }

    /// Resolve once the first cycle has drained.
    pub async fn wait_ready(&self) {
        self.inner.gate.wait().await;
    }

    /// Spawn the run loop: one cycle immediately, then one per interval.
    ///
    /// Calling `start` on a retriever that is already running does nothing.
    pub fn start(&self) {
        let mut slot = self.inner.run_handle.lock();
        if slot.is_some() {
            warn!("Message retriever already started");
            return;
        }
        info!(
            "Starting message retriever for {:?} with {} handlers (every {:?})",
            self.inner.peer_id,
            self.inner.dispatcher.table().len(),
            self.inner.config.scan_interval
        );
        let retriever = self.clone();
        *slot = Some(tokio::spawn(async move { retriever.run().await }));
    }

    /// Stop scheduling cycles and wait for the ones in flight to drain.
    ///
    /// A running cycle is never aborted: its addresses are already claimed.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.run_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Message retriever task failed: {}", e);
            }
        }
    }

    async fn run(self) {
        let token = self.inner.shutdown.clone();
        let mut ticker = tokio::time::interval(self.inner.config.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; that is the startup cycle.
        ticker.tick().await;

        self.scan_logged().await;
        // An aborted first cycle counts as an empty one.
        self.inner.gate.fire();

        let mut cycles = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    info!("Message retriever shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    while cycles.try_join_next().is_some() {}
                    let retriever = self.clone();
                    cycles.spawn(async move { retriever.scan_logged().await });
                }
            }
        }

        if !cycles.is_empty() {
            debug!("Waiting for {} scan cycles to drain", cycles.len());
        }
        while let Some(joined) = cycles.join_next().await {
            if let Err(e) = joined {
                error!("Scan cycle task failed: {}", e);
            }
        }
    }

    async fn scan_logged(&self) {
        match self.run_cycle().await {
            Ok(report) => info!("Offline message scan finished: {}", report),
            Err(e) => error!("Offline message scan aborted: {}", e),
        }
    }
}
