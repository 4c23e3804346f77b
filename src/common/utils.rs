//! Utility functions for quorumkv

use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp (milliseconds)
pub fn timestamp_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Exponential backoff schedule with jitter.
///
/// `delay(n)` for attempt n doubles from the initial value up to the cap,
/// then adds up to 25% random jitter so contending clients desynchronize.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, cap: Duration) -> Self {
        Self { initial, cap }
    }

    /// Deterministic base delay for the given zero-indexed attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let shifted = self
            .initial
            .saturating_mul(1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX));
        shifted.min(self.cap)
    }

    /// Base delay plus jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_ms = base.as_millis() as u64 / 4;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Smallest key strictly greater than `key`, for exclusive-start paging.
pub fn successor_key(key: &str) -> String {
    let mut next = String::with_capacity(key.len() + 1);
    next.push_str(key);
    next.push('\0');
    next
}
