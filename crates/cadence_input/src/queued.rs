//! Queued input events, their pool and the pending FIFO

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;

use cadence_platform::{InputEvent, SourceClass};

bitflags! {
    /// Delivery state of a queued event
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct QueuedFlags: u32 {
        /// Skip the pre-IME stages and the IME
        const DELIVER_POST_IME = 1 << 0;
        /// Waiting on an async stage
        const DEFERRED = 1 << 1;
        /// A stage finished the event; remaining stages only pass it along
        const FINISHED = 1 << 2;
        /// The finishing stage handled the event
        const FINISHED_HANDLED = 1 << 3;
        /// The synthetic stage processed the event
        const RESYNTHESIZED = 1 << 4;
        /// Sent straight to the synthetic stage after going unhandled
        const UNHANDLED = 1 << 5;
    }
}

/// Platform-side source of input events that must be told when each one is done
pub trait InputEventReceiver: Send + Sync {
    fn finish_input_event(&self, seq: u64, handled: bool);
}

/// Link back to the receiver that produced an event
#[derive(Clone)]
pub struct ReceiverRef {
    receiver: Arc<dyn InputEventReceiver>,
    seq: u64,
    /// Sequence numbers of events folded into this one by batching
    batched: SmallVec<[u64; 4]>,
}

impl ReceiverRef {
    pub fn new(receiver: Arc<dyn InputEventReceiver>, seq: u64) -> Self {
        Self { receiver, seq, batched: SmallVec::new() }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether both refer to the same receiver
    pub fn same_receiver(&self, other: &ReceiverRef) -> bool {
        Arc::ptr_eq(&self.receiver, &other.receiver)
    }

    /// Take over `newer`'s sequence number; this one's is finished along with it
    pub fn absorb(&mut self, newer: ReceiverRef) {
        self.batched.push(self.seq);
        self.batched.extend(newer.batched);
        self.seq = newer.seq;
    }

    /// Report completion for every sequence number carried
    pub fn finish(self, handled: bool) {
        for seq in &self.batched {
            self.receiver.finish_input_event(*seq, handled);
        }
        self.receiver.finish_input_event(self.seq, handled);
    }
}

impl fmt::Debug for ReceiverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverRef").field("seq", &self.seq).field("batched", &self.batched).finish()
    }
}

/// An input event travelling through the stage chain
#[derive(Debug)]
pub struct QueuedInputEvent {
    seq: u64,
    pub event: InputEvent,
    pub flags: QueuedFlags,
    receiver: Option<ReceiverRef>,
}

impl QueuedInputEvent {
    /// Pipeline-assigned sequence number
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether the event was synthesized rather than received
    pub fn is_synthesized(&self) -> bool {
        self.receiver.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.flags.contains(QueuedFlags::FINISHED)
    }

    pub fn is_deferred(&self) -> bool {
        self.flags.contains(QueuedFlags::DEFERRED)
    }

    /// Start after the IME: post-IME deliveries and pointer motion
    pub fn should_skip_ime(&self) -> bool {
        if self.flags.contains(QueuedFlags::DELIVER_POST_IME) {
            return true;
        }
        matches!(&self.event, InputEvent::Motion(m) if m.source.is_class(SourceClass::POINTER)
            || m.source == cadence_platform::InputSource::RotaryEncoder)
    }

    pub fn should_send_to_synthesizer(&self) -> bool {
        self.flags.contains(QueuedFlags::UNHANDLED)
    }

    pub(crate) fn take_receiver(&mut self) -> Option<ReceiverRef> {
        self.receiver.take()
    }
}

/// Bounded free-list of queued event boxes
#[derive(Debug)]
pub struct EventPool {
    free: Vec<Box<QueuedInputEvent>>,
    capacity: usize,
}

impl EventPool {
    pub fn new(capacity: usize) -> Self {
        Self { free: Vec::with_capacity(capacity), capacity }
    }

    pub fn obtain(
        &mut self,
        seq: u64,
        event: InputEvent,
        receiver: Option<ReceiverRef>,
        flags: QueuedFlags,
    ) -> Box<QueuedInputEvent> {
        let fresh = QueuedInputEvent { seq, event, flags, receiver };
        match self.free.pop() {
            Some(mut recycled) => {
                *recycled = fresh;
                recycled
            }
            None => Box::new(fresh),
        }
    }

    pub fn recycle(&mut self, q: Box<QueuedInputEvent>) {
        if self.free.len() < self.capacity {
            self.free.push(q);
        }
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

/// Arrival-order queue of events waiting to enter the stage chain
#[derive(Debug, Default)]
pub struct PendingInputQueue {
    events: VecDeque<Box<QueuedInputEvent>>,
}

impl PendingInputQueue {
    pub fn push(&mut self, q: Box<QueuedInputEvent>) {
        self.events.push_back(q);
    }

    pub fn pop(&mut self) -> Option<Box<QueuedInputEvent>> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
