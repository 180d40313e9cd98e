//! Single-fire readiness signal.

use std::sync::Arc;

use tokio::sync::watch;

/// Fires once, after the first retrieval cycle has drained.
///
/// Later calls to [`StartupGate::fire`] are no-ops, so waiters observe
/// exactly one transition.
#[derive(Debug, Clone)]
pub struct StartupGate {
    tx: Arc<watch::Sender<bool>>,
}

impl StartupGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Open the gate. Returns `true` only for the call that opened it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the gate has fired. Returns at once if it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for StartupGate {
    fn default() -> Self {
        Self::new()
    }
}
