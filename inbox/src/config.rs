//! Configuration constants and the retriever configuration.
//!
//! Tunables live here as named constants so that the retriever, the
//! fetcher and the republisher agree on the same defaults.

use std::time::Duration;

use crate::crypto::SEALED_OVERHEAD;
use crate::error::{InboxError, InboxResult};

/// Interval in seconds between offline-message scan cycles.
pub const SCAN_INTERVAL_SECS: u64 = 3600;

/// Default number of locator bits shared by a DHT privacy bucket.
pub const DEFAULT_PREFIX_LEN: u16 = 16;

/// Upper bound for the prefix length (a locator is a 256-bit digest).
pub const MAX_PREFIX_LEN: u16 = 256;

/// Fixed timeout for HTTPS mirror fetches.
pub const MIRROR_FETCH_TIMEOUT_SECS: u64 = 10;

/// Deadline for content-addressed fetches.
pub const CONTENT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Maximum number of fetch tasks in flight per scan cycle.
pub const MAX_CONCURRENT_FETCHES: usize = 32;

/// Maximum size of a decrypted envelope frame (1 MiB).
pub const MAX_ENVELOPE_SIZE: u64 = 1024 * 1024;

/// Largest ciphertext a fetch may return: a full envelope plus the
/// sealed-box framing.
pub const MAX_CIPHERTEXT_SIZE: usize = MAX_ENVELOPE_SIZE as usize + SEALED_OVERHEAD;

/// Maximum size of a CBOR pointer record.
pub const MAX_POINTER_RECORD_SIZE: usize = 16 * 1024;

/// Lifetime of a pointer advertising a pending message (30 days).
pub const MESSAGE_POINTER_TTL_SECS: u64 = 30 * 24 * 3600;

/// Lifetime of long-lived pointers such as the moderator pointer (7 days).
pub const DEFAULT_POINTER_TTL_SECS: u64 = 7 * 24 * 3600;

/// Interval in seconds between pointer republish passes.
pub const REPUBLISH_INTERVAL_SECS: u64 = 12 * 3600;

/// Runtime configuration for [`MessageRetriever`](crate::MessageRetriever).
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Time between scan cycles; one extra cycle runs immediately at start.
    pub scan_interval: Duration,
    /// Locator prefix length used for pointer lookups.
    pub prefix_len: u16,
    /// Worker pool size for fetch tasks within one cycle.
    pub max_concurrent_fetches: usize,
    /// Deadline for content-addressed retrieval.
    pub content_fetch_timeout: Duration,
    /// Deadline for HTTPS mirror retrieval.
    pub mirror_fetch_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(SCAN_INTERVAL_SECS),
            prefix_len: DEFAULT_PREFIX_LEN,
            max_concurrent_fetches: MAX_CONCURRENT_FETCHES,
            content_fetch_timeout: Duration::from_secs(CONTENT_FETCH_TIMEOUT_SECS),
            mirror_fetch_timeout: Duration::from_secs(MIRROR_FETCH_TIMEOUT_SECS),
        }
    }
}

impl RetrieverConfig {
    #[must_use]
    pub const fn with_prefix_len(mut self, prefix_len: u16) -> Self {
        self.prefix_len = prefix_len;
        self
    }

    #[must_use]
    pub const fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit;
        self
    }

    #[must_use]
    pub const fn with_content_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.content_fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_mirror_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.mirror_fetch_timeout = timeout;
        self
    }

    /// Check values that would otherwise stall or panic at runtime.
    pub fn validate(&self) -> InboxResult<()> {
        if self.max_concurrent_fetches == 0 {
            return Err(InboxError::Config(
                "max_concurrent_fetches must be at least 1".into(),
            ));
        }
        if self.scan_interval.is_zero() {
            return Err(InboxError::Config("scan_interval must be non-zero".into()));
        }
        Ok(())
    }
}

/// Return the current Unix timestamp in seconds.
///
/// For testable code, prefer accepting a [`Clock`](crate::traits::Clock).
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
