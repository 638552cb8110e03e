//! Per-device ordering for async stages
//!
//! An async stage may see completions out of order. Before an event moves on
//! to the next stage, every earlier event from the same device still held at
//! this stage must have moved on first. Events from different devices never
//! block each other.

use std::collections::VecDeque;

use crate::queued::{QueuedFlags, QueuedInputEvent};

/// Events held at one async stage, in the order they were deferred or blocked
#[derive(Debug, Default)]
pub struct DeferredQueue {
    events: VecDeque<Box<QueuedInputEvent>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Hold an event until its async completion arrives
    pub fn defer(&mut self, mut q: Box<QueuedInputEvent>) {
        q.flags.insert(QueuedFlags::DEFERRED);
        self.events.push_back(q);
    }

    pub fn get_mut(&mut self, seq: u64) -> Option<&mut QueuedInputEvent> {
        self.events.iter_mut().find(|q| q.seq() == seq).map(|q| &mut **q)
    }

    /// Forward an event that is not held here
    ///
    /// Returns the event if it may move on now, or keeps it queued behind an
    /// earlier event from the same device.
    pub fn forward(&mut self, mut q: Box<QueuedInputEvent>) -> Option<Box<QueuedInputEvent>> {
        q.flags.remove(QueuedFlags::DEFERRED);
        let device = q.event.device_id();
        if self.events.iter().any(|held| held.event.device_id() == device) {
            tracing::trace!(seq = q.seq(), device, "blocked behind an earlier event from the same device");
            self.events.push_back(q);
            return None;
        }
        Some(q)
    }

    /// Forward a held event
    ///
    /// Returns the events that may move on, in order: the event itself plus
    /// any following same-device events that are no longer deferred, up to
    /// the first one still deferred. Returns an empty list if an earlier
    /// same-device event is still held, and `None` if `seq` is not held here.
    pub fn release(&mut self, seq: u64) -> Option<Vec<Box<QueuedInputEvent>>> {
        let position = self.events.iter().position(|q| q.seq() == seq)?;
        let device = self.events[position].event.device_id();
        self.events[position].flags.remove(QueuedFlags::DEFERRED);

        if self.events.iter().take(position).any(|held| held.event.device_id() == device) {
            return Some(Vec::new());
        }

        let mut released = Vec::new();
        released.extend(self.events.remove(position));
        let mut index = position;
        while index < self.events.len() {
            let held = &self.events[index];
            if held.event.device_id() != device {
                index += 1;
                continue;
            }
            if held.is_deferred() {
                break;
            }
            released.extend(self.events.remove(index));
        }
        Some(released)
    }

    /// Take every held event, for teardown
    pub fn drain(&mut self) -> impl Iterator<Item = Box<QueuedInputEvent>> + '_ {
        self.events.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedInputEvent> {
        self.events.iter().map(|q| &**q)
    }
}
