//! Controllable clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::traits::Clock;

/// Clock whose time only moves when a test moves it.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<AtomicU64>,
}

impl MockClock {
    pub fn new(initial: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(initial)),
        }
    }

    pub fn set(&self, timestamp: u64) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(1_704_067_200) // 2024-01-01 00:00:00 UTC
    }
}

impl Clock for MockClock {
    fn now_unix(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
