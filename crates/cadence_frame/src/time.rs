//! Monotonic time sources
//!
//! All frame and input times are signed nanoseconds from an arbitrary origin.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const NANOS_PER_MS: i64 = 1_000_000;

/// Source of monotonic nanoseconds
pub trait TimeSource: Send + Sync {
    fn now_nanos(&self) -> i64;
}

/// Wall-clock monotonic time measured from creation
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_nanos(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// Manually advanced time for deterministic tests and replays
///
/// Clones share the same clock.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Arc<AtomicI64>,
}

impl ManualTimeSource {
    pub fn new(start_nanos: i64) -> Self {
        Self { now: Arc::new(AtomicI64::new(start_nanos)) }
    }

    pub fn set(&self, nanos: i64) {
        self.now.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, nanos: i64) {
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, millis: i64) {
        self.advance(millis * NANOS_PER_MS);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_nanos(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
