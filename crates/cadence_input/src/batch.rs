//! Coalescing of pointer movement between frames
//!
//! Move samples for the same device and source fold into one event whose
//! history carries the earlier samples. The batch is consumed once per
//! frame, or right away while unbuffered dispatch is active.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use cadence_platform::{DeviceId, InputEvent, InputSource, MotionAction, MotionEvent, SourceClass};

use crate::queued::ReceiverRef;

/// An event ready to enter the pipeline, with its receiver
pub type BatchedEvent = (InputEvent, Option<ReceiverRef>);

#[derive(Debug)]
struct BatchEntry {
    event: MotionEvent,
    receiver: Option<ReceiverRef>,
}

impl BatchEntry {
    fn accepts(&self, event: &MotionEvent, receiver: &Option<ReceiverRef>) -> bool {
        let same_receiver = match (&self.receiver, receiver) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_receiver(b),
            _ => false,
        };
        same_receiver && self.event.action == event.action && self.event.pointers.len() == event.pointers.len()
    }
}

/// Pointer movement waiting for the next frame
#[derive(Debug, Default)]
pub struct InputBatcher {
    entries: VecDeque<BatchEntry>,
    /// Index of the open entry per device and source
    open: FxHashMap<(DeviceId, InputSource), usize>,
}

impl InputBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event may wait for the next frame
    pub fn should_batch(event: &InputEvent) -> bool {
        matches!(event, InputEvent::Motion(m) if m.source.is_class(SourceClass::POINTER)
            && matches!(m.action, MotionAction::Move | MotionAction::HoverMove))
    }

    pub fn has_pending(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a movement sample, folding it into the device's open entry when possible
    pub fn add(&mut self, event: MotionEvent, receiver: Option<ReceiverRef>) {
        let key = (event.device_id, event.source);
        if let Some(entry) = self.open.get(&key).and_then(|&index| self.entries.get_mut(index)) {
            if entry.accepts(&event, &receiver) {
                entry.event.add_batch(&event);
                if let (Some(batched), Some(newer)) = (entry.receiver.as_mut(), receiver) {
                    batched.absorb(newer);
                }
                return;
            }
        }
        self.open.insert(key, self.entries.len());
        self.entries.push_back(BatchEntry { event, receiver });
    }

    /// Take everything batched for a device, so a following event cannot overtake it
    pub fn take_device(&mut self, device: DeviceId) -> Vec<BatchedEvent> {
        if !self.entries.iter().any(|entry| entry.event.device_id == device) {
            return Vec::new();
        }
        let (taken, kept): (VecDeque<_>, VecDeque<_>) =
            self.entries.drain(..).partition(|entry| entry.event.device_id == device);
        self.entries = kept;
        self.reindex();
        taken.into_iter().map(|entry| (entry.event.into(), entry.receiver)).collect()
    }

    /// Take batched events due by `frame_time_nanos`, or all of them
    pub fn consume(&mut self, frame_time_nanos: Option<i64>) -> Vec<BatchedEvent> {
        let mut consumed = Vec::new();
        while let Some(entry) = self.entries.front() {
            if frame_time_nanos.is_some_and(|frame_time| entry.event.oldest_event_time() > frame_time) {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                consumed.push((entry.event.into(), entry.receiver));
            }
        }
        if !consumed.is_empty() {
            self.reindex();
            tracing::trace!(count = consumed.len(), remaining = self.entries.len(), "consumed batched input");
        }
        consumed
    }

    fn reindex(&mut self) {
        self.open.clear();
        for (index, entry) in self.entries.iter().enumerate() {
            self.open.insert((entry.event.device_id, entry.event.source), index);
        }
    }
}
