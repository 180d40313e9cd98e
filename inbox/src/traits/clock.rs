//! Wall-clock abstraction for pointer timestamps and expiry.

/// Source of the current Unix time.
///
/// Pointer publication times and TTL checks go through this so that expiry
/// can be tested without waiting.
pub trait Clock: Send + Sync + 'static {
    /// Seconds since the Unix epoch.
    fn now_unix(&self) -> u64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        crate::config::now_unix()
    }
}
