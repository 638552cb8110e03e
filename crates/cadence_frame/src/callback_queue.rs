//! Time-ordered callback queues
//!
//! One queue exists per [`CallbackPhase`](crate::CallbackPhase). Records are
//! kept sorted by due time; a record added with the same due time as existing
//! ones goes after them, so equal-time callbacks run in FIFO order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Closure run with the frame time in nanoseconds
pub type FrameCallback = Arc<dyn Fn(i64) + Send + Sync>;

/// Action addressed to an object living on the owner thread
///
/// The owner-thread driver routes `what` to the object identified by `target`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionTarget {
    pub target: u64,
    pub what: u32,
}

/// Something to run when a callback comes due
#[derive(Clone)]
pub enum FrameAction {
    /// A shared closure, compared by identity
    Callback(FrameCallback),
    /// A routed action, compared by value
    Target(ActionTarget),
}

impl FrameAction {
    /// Wrap a closure
    pub fn callback(f: impl Fn(i64) + Send + Sync + 'static) -> Self {
        FrameAction::Callback(Arc::new(f))
    }

    /// Whether two actions denote the same callback
    pub fn same_as(&self, other: &FrameAction) -> bool {
        match (self, other) {
            (FrameAction::Callback(a), FrameAction::Callback(b)) => Arc::ptr_eq(a, b),
            (FrameAction::Target(a), FrameAction::Target(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for FrameAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameAction::Callback(cb) => write!(f, "Callback({:p})", Arc::as_ptr(cb)),
            FrameAction::Target(target) => write!(f, "Target({}, {})", target.target, target.what),
        }
    }
}

impl From<ActionTarget> for FrameAction {
    fn from(target: ActionTarget) -> Self {
        FrameAction::Target(target)
    }
}

/// Opaque tag used to remove groups of callbacks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackToken(pub u64);

/// Token attached to callbacks posted with `post_frame_callback`
pub const FRAME_CALLBACK_TOKEN: CallbackToken = CallbackToken(u64::MAX);

/// A queued callback
#[derive(Clone, Debug)]
pub struct CallbackRecord {
    pub due_time: i64,
    pub action: FrameAction,
    pub token: Option<CallbackToken>,
}

impl CallbackRecord {
    fn matches(&self, action: Option<&FrameAction>, token: Option<CallbackToken>) -> bool {
        action.map_or(true, |a| self.action.same_as(a)) && token.map_or(true, |t| self.token == Some(t))
    }
}

/// Callbacks of one phase, ordered by due time
#[derive(Debug, Default)]
pub struct CallbackQueue {
    records: VecDeque<CallbackRecord>,
}

impl CallbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the earliest record is due at `now`
    pub fn has_due_callbacks(&self, now: i64) -> bool {
        self.records.front().is_some_and(|r| r.due_time <= now)
    }

    /// Insert after every record due at or before `due_time`
    pub fn add_callback(&mut self, due_time: i64, action: FrameAction, token: Option<CallbackToken>) {
        let position = self.records.partition_point(|r| r.due_time <= due_time);
        self.records.insert(position, CallbackRecord { due_time, action, token });
    }

    /// Detach and return the due prefix, in order
    pub fn extract_due_callbacks(&mut self, now: i64) -> Vec<CallbackRecord> {
        let split = self.records.partition_point(|r| r.due_time <= now);
        self.records.drain(..split).collect()
    }

    /// Remove records matching `action` and `token`; `None` matches anything
    pub fn remove_callbacks(&mut self, action: Option<&FrameAction>, token: Option<CallbackToken>) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !r.matches(action, token));
        before - self.records.len()
    }

    /// Due time of the earliest record
    pub fn next_due_time(&self) -> Option<i64> {
        self.records.front().map(|r| r.due_time)
    }
}
