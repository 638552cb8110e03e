//! Vsync sources

use std::sync::atomic::{AtomicUsize, Ordering};

/// Requests vsync pulses from the display
///
/// A pulse requested with [`schedule_vsync`](VsyncSource::schedule_vsync) is
/// delivered once, by calling [`FrameClock::on_vsync`](crate::FrameClock::on_vsync)
/// from any thread.
pub trait VsyncSource: Send + Sync {
    fn schedule_vsync(&self);
}

/// Vsync source that only counts requests; tests deliver pulses by hand
#[derive(Debug, Default)]
pub struct ManualVsync {
    requests: AtomicUsize,
}

impl ManualVsync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pulses requested so far
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl VsyncSource for ManualVsync {
    fn schedule_vsync(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}
