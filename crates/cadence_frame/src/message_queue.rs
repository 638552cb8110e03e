//! Owner-thread message queue with synchronization barriers
//!
//! Messages are ordered by delivery time, FIFO among equal times. A sync
//! barrier, once it reaches the head of the queue, holds back every
//! synchronous message behind it while asynchronous messages keep flowing.
//! Traversals use this to run before any ordinary work posted after them.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{FrameError, Result};
use crate::time::{TimeSource, NANOS_PER_MS};

/// Identifies a posted sync barrier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BarrierToken(u64);

enum EntryKind<M> {
    Message { payload: M, asynchronous: bool },
    Barrier(BarrierToken),
}

struct Entry<M> {
    when: i64,
    kind: EntryKind<M>,
}

struct QueueState<M> {
    entries: Vec<Entry<M>>,
    next_barrier: u64,
    quitting: bool,
}

struct Shared<M> {
    state: Mutex<QueueState<M>>,
    available: Condvar,
    time: Arc<dyn TimeSource>,
}

/// Cloneable handle to a message queue
pub struct MessageQueue<M> {
    shared: Arc<Shared<M>>,
}

impl<M> Clone for MessageQueue<M> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<M> MessageQueue<M> {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState { entries: Vec::new(), next_barrier: 0, quitting: false }),
                available: Condvar::new(),
                time,
            }),
        }
    }

    pub fn now_nanos(&self) -> i64 {
        self.shared.time.now_nanos()
    }

    // ========================================================================
    // Posting
    // ========================================================================

    /// Post a synchronous message for immediate delivery
    pub fn post(&self, message: M) -> bool {
        self.post_at(self.now_nanos(), message, false)
    }

    /// Post an asynchronous message for immediate delivery
    pub fn post_async(&self, message: M) -> bool {
        self.post_at(self.now_nanos(), message, true)
    }

    /// Post a message after `delay`
    pub fn post_delayed(&self, delay: Duration, message: M, asynchronous: bool) -> bool {
        let delay = i64::try_from(delay.as_nanos()).unwrap_or(i64::MAX / 2);
        self.post_at(self.now_nanos().saturating_add(delay), message, asynchronous)
    }

    /// Post a message for delivery at `when` nanoseconds
    pub fn post_at(&self, when: i64, message: M, asynchronous: bool) -> bool {
        let mut state = self.shared.state.lock();
        if state.quitting {
            tracing::warn!("message posted to a quitting queue, dropping");
            return false;
        }
        let position = state.entries.partition_point(|e| e.when <= when);
        state.entries.insert(position, Entry { when, kind: EntryKind::Message { payload: message, asynchronous } });
        drop(state);
        self.shared.available.notify_all();
        true
    }

    /// Post a message ahead of everything already queued
    pub fn post_at_front(&self, message: M, asynchronous: bool) -> bool {
        let mut state = self.shared.state.lock();
        if state.quitting {
            return false;
        }
        state.entries.insert(0, Entry { when: i64::MIN, kind: EntryKind::Message { payload: message, asynchronous } });
        drop(state);
        self.shared.available.notify_all();
        true
    }

    // ========================================================================
    // Barriers
    // ========================================================================

    /// Block synchronous messages queued after now until the barrier is removed
    pub fn post_sync_barrier(&self) -> BarrierToken {
        let when = self.now_nanos();
        let mut state = self.shared.state.lock();
        let token = BarrierToken(state.next_barrier);
        state.next_barrier += 1;
        let position = state.entries.partition_point(|e| e.when <= when);
        state.entries.insert(position, Entry { when, kind: EntryKind::Barrier(token) });
        token
    }

    pub fn remove_sync_barrier(&self, token: BarrierToken) -> Result<()> {
        let mut state = self.shared.state.lock();
        let position = state
            .entries
            .iter()
            .position(|e| matches!(e.kind, EntryKind::Barrier(t) if t == token))
            .ok_or(FrameError::BarrierNotFound)?;
        state.entries.remove(position);
        drop(state);
        self.shared.available.notify_all();
        Ok(())
    }

    // ========================================================================
    // Removal and queries
    // ========================================================================

    /// Remove every message matching `predicate`; returns how many were removed
    pub fn remove_where(&self, mut predicate: impl FnMut(&M) -> bool) -> usize {
        let mut state = self.shared.state.lock();
        let before = state.entries.len();
        state.entries.retain(|e| match &e.kind {
            EntryKind::Message { payload, .. } => !predicate(payload),
            EntryKind::Barrier(_) => true,
        });
        before - state.entries.len()
    }

    pub fn contains_where(&self, mut predicate: impl FnMut(&M) -> bool) -> bool {
        let state = self.shared.state.lock();
        state.entries.iter().any(|e| matches!(&e.kind, EntryKind::Message { payload, .. } if predicate(payload)))
    }

    /// Number of queued messages, barriers excluded
    pub fn len(&self) -> usize {
        let state = self.shared.state.lock();
        state.entries.iter().filter(|e| matches!(e.kind, EntryKind::Message { .. })).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Take the next deliverable message, if one is due now
    pub fn poll(&self) -> Option<M> {
        let now = self.now_nanos();
        let mut state = self.shared.state.lock();
        let index = Self::next_deliverable(&state.entries)?;
        if state.entries[index].when > now {
            return None;
        }
        match state.entries.remove(index).kind {
            EntryKind::Message { payload, .. } => Some(payload),
            EntryKind::Barrier(_) => None,
        }
    }

    /// Delivery time of the next deliverable message
    pub fn next_wake_time(&self) -> Option<i64> {
        let state = self.shared.state.lock();
        Self::next_deliverable(&state.entries).map(|i| state.entries[i].when)
    }

    /// Wait up to `timeout` for a deliverable message
    ///
    /// Returns `None` on timeout or once the queue is quitting.
    pub fn wait(&self, timeout: Duration) -> Option<M> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(message) = self.poll() {
                return Some(message);
            }
            let now = self.now_nanos();
            let mut state = self.shared.state.lock();
            if state.quitting {
                return None;
            }
            let until_message = Self::next_deliverable(&state.entries)
                .map(|i| Duration::from_nanos(u64::try_from(state.entries[i].when.saturating_sub(now)).unwrap_or(0)));
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let wait_for = until_message.map_or(remaining, |d| d.min(remaining)).max(Duration::from_nanos(NANOS_PER_MS as u64 / 10));
            self.shared.available.wait_for(&mut state, wait_for);
        }
    }

    /// Stop accepting messages and wake any waiter
    pub fn quit(&self) {
        let mut state = self.shared.state.lock();
        state.quitting = true;
        state.entries.clear();
        drop(state);
        self.shared.available.notify_all();
    }

    pub fn is_quitting(&self) -> bool {
        self.shared.state.lock().quitting
    }

    fn next_deliverable(entries: &[Entry<M>]) -> Option<usize> {
        match entries.first()?.kind {
            EntryKind::Barrier(_) => entries
                .iter()
                .position(|e| matches!(e.kind, EntryKind::Message { asynchronous: true, .. })),
            EntryKind::Message { .. } => Some(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeSource;

    fn queue() -> (MessageQueue<&'static str>, ManualTimeSource) {
        let time = ManualTimeSource::new(1_000);
        (MessageQueue::new(Arc::new(time.clone())), time)
    }

    fn drain(queue: &MessageQueue<&'static str>) -> Vec<&'static str> {
        std::iter::from_fn(|| queue.poll()).collect()
    }

    #[test]
    fn test_time_order_and_fifo() {
        let (queue, time) = queue();
        queue.post_at(2_000, "late", false);
        queue.post("a");
        queue.post("b");
        queue.post_at_front("front", false);

        assert_eq!(drain(&queue), vec!["front", "a", "b"]);
        time.set(2_000);
        assert_eq!(drain(&queue), vec!["late"]);
    }

    #[test]
    fn test_barrier_blocks_sync_but_not_async() {
        let (queue, _time) = queue();
        queue.post("before");
        let barrier = queue.post_sync_barrier();
        queue.post("sync");
        queue.post_async("async");

        assert_eq!(drain(&queue), vec!["before", "async"]);
        queue.remove_sync_barrier(barrier).unwrap();
        assert_eq!(drain(&queue), vec!["sync"]);
        assert_eq!(queue.remove_sync_barrier(barrier), Err(FrameError::BarrierNotFound));
    }

    #[test]
    fn test_next_wake_time_skips_blocked() {
        let (queue, _time) = queue();
        queue.post_sync_barrier();
        queue.post("blocked");
        assert_eq!(queue.next_wake_time(), None);
        queue.post_at(5_000, "async", true);
        assert_eq!(queue.next_wake_time(), Some(5_000));
    }

    #[test]
    fn test_remove_where() {
        let (queue, _time) = queue();
        queue.post("keep");
        queue.post("drop");
        queue.post("drop");
        assert_eq!(queue.remove_where(|m| *m == "drop"), 2);
        assert_eq!(drain(&queue), vec!["keep"]);
    }

    #[test]
    fn test_quit_rejects_posts() {
        let (queue, _time) = queue();
        queue.quit();
        assert!(!queue.post("late"));
        assert_eq!(queue.wait(Duration::from_millis(1)), None);
    }
}
