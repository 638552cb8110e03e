//! Countdown latch for draw acknowledgements
//!
//! A reported draw waits until every registered [`WindowDrawCallback`] has
//! acknowledged the frame, bounded by a timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Observer told about draws the compositor asked to have reported
pub trait WindowDrawCallback: Send + Sync {
    /// A reported draw was submitted; finish `ack` once the frame is done
    fn on_post_draw(&self, ack: DrawAck);
}

struct LatchInner {
    remaining: Mutex<usize>,
    done: Condvar,
}

/// Counts outstanding draw acknowledgements
pub struct DrawLatch {
    inner: Arc<LatchInner>,
}

impl DrawLatch {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(LatchInner { remaining: Mutex::new(count), done: Condvar::new() }),
        }
    }

    /// Handle that counts the latch down once
    pub fn ack(&self) -> DrawAck {
        DrawAck { inner: Arc::clone(&self.inner) }
    }

    pub fn remaining(&self) -> usize {
        *self.inner.remaining.lock()
    }

    /// Block until the count reaches zero; false on timeout
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.inner.remaining.lock();
        while *remaining > 0 {
            if self.inner.done.wait_until(&mut remaining, deadline).timed_out() {
                return *remaining == 0;
            }
        }
        true
    }
}

/// One acknowledgement owed to a [`DrawLatch`]; may be finished on any thread
pub struct DrawAck {
    inner: Arc<LatchInner>,
}

impl DrawAck {
    pub fn finish(self) {
        let mut remaining = self.inner.remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.inner.done.notify_all();
            }
        }
    }
}

impl std::fmt::Debug for DrawAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawAck").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    #[test]
    fn test_acks_from_other_threads_release_wait() {
        let latch = DrawLatch::new(2);
        let acks = vec![latch.ack(), latch.ack()];
        let handles: Vec<_> = acks.into_iter().map(|ack| thread::spawn(move || ack.finish())).collect();
        assert!(latch.wait(Duration::from_secs(5)));
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(latch.remaining(), 0);
    }

    #[test]
    fn test_wait_times_out() {
        let latch = DrawLatch::new(1);
        let _ack = latch.ack();
        assert!(!latch.wait(Duration::from_millis(10)));
        assert_eq!(latch.remaining(), 1);
    }

    #[test]
    fn test_zero_count_does_not_block() {
        assert!(DrawLatch::new(0).wait(Duration::ZERO));
    }
}
