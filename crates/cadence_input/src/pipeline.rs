//! The input pipeline: pending FIFO, stage chain and async completions
//!
//! Events enter a single arrival-order FIFO. Draining it sends each event
//! into the stage chain at its start stage. Async stages may hold an event
//! while later events keep flowing; per-device order is preserved by each
//! async stage's [`DeferredQueue`].

use std::fmt::Write as _;
use std::sync::Arc;

use cadence_platform::{InputDevices, InputEvent, NoInputDevices};

use crate::config::InputConfig;
use crate::deferred::DeferredQueue;
use crate::error::{InputError, Result};
use crate::queued::{EventPool, PendingInputQueue, QueuedFlags, QueuedInputEvent, ReceiverRef};
use crate::stage::{DeferredToken, InputContext, InputStage, StageKind, StageResult, SyntheticTimer};
use crate::stages::{
    EarlyPostImeStage, FallbackEventHandler, ImeSession, ImeStage, NativeInputQueue, NativePostImeStage,
    NativePreImeStage, NoFallback, SyntheticStage, ViewPostImeStage, ViewPreImeStage,
};
use crate::synth::{DefaultKeyCharacterMap, KeyCharacterMap};

/// Services the stages hand events to
#[derive(Clone)]
pub struct InputCollaborators {
    pub native_queue: Option<Arc<dyn NativeInputQueue>>,
    pub ime: Option<Arc<dyn ImeSession>>,
    pub fallback: Arc<dyn FallbackEventHandler>,
    pub key_character_map: Arc<dyn KeyCharacterMap>,
    pub devices: Arc<dyn InputDevices>,
}

impl Default for InputCollaborators {
    fn default() -> Self {
        Self {
            native_queue: None,
            ime: None,
            fallback: Arc::new(NoFallback),
            key_character_map: Arc::new(DefaultKeyCharacterMap),
            devices: Arc::new(NoInputDevices),
        }
    }
}

/// Summary of one drain of the pending queue
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Events sent into the chain, synthesized ones included
    pub delivered: usize,
    /// Newest and oldest sample times of the last motion event delivered
    pub motion_times: Option<(i64, i64)>,
}

struct StageSlot {
    stage: Box<dyn InputStage>,
    /// Present for async stages
    deferred: Option<DeferredQueue>,
}

/// A window's input stage chain and pending FIFO
pub struct InputPipeline {
    stages: Vec<StageSlot>,
    pending: PendingInputQueue,
    pool: EventPool,
    next_seq: u64,
}

impl InputPipeline {
    pub fn new(config: &InputConfig, collaborators: InputCollaborators) -> Self {
        let InputCollaborators { native_queue, ime, fallback, key_character_map, devices } = collaborators;
        let chain: Vec<Box<dyn InputStage>> = vec![
            Box::new(NativePreImeStage::new(native_queue.clone())),
            Box::new(ViewPreImeStage),
            Box::new(ImeStage::new(ime)),
            Box::new(EarlyPostImeStage::new(Arc::clone(&fallback))),
            Box::new(NativePostImeStage::new(native_queue)),
            Box::new(ViewPostImeStage::new(fallback)),
            Box::new(SyntheticStage::new(config, devices, key_character_map)),
        ];
        let stages = chain
            .into_iter()
            .enumerate()
            .map(|(index, stage)| {
                debug_assert_eq!(stage.kind().index(), index);
                let deferred = stage.is_async().then(DeferredQueue::new);
                StageSlot { stage, deferred }
            })
            .collect();
        Self {
            stages,
            pending: PendingInputQueue::default(),
            pool: EventPool::new(config.pool_capacity),
            next_seq: 1,
        }
    }

    // ========================================================================
    // Enqueue
    // ========================================================================

    /// Append an event to the pending FIFO; returns its sequence number
    pub fn enqueue(&mut self, event: InputEvent, receiver: Option<ReceiverRef>, flags: QueuedFlags) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        tracing::trace!(seq, device = event.device_id(), "enqueue input event");
        let q = self.pool.obtain(seq, event, receiver, flags);
        self.pending.push(q);
        seq
    }

    /// Send an event nothing handled straight to the synthetic stage
    pub fn enqueue_unhandled(&mut self, event: InputEvent) -> u64 {
        self.enqueue(event, None, QueuedFlags::UNHANDLED)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Events held at async stages
    pub fn deferred_len(&self) -> usize {
        self.stages.iter().filter_map(|slot| slot.deferred.as_ref()).map(DeferredQueue::len).sum()
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Drain the pending FIFO into the stage chain, in arrival order
    ///
    /// Events synthesized along the way join the tail of the FIFO and are
    /// drained in the same pass.
    pub fn process_pending(&mut self, cx: &mut InputContext<'_>) -> ProcessReport {
        let mut report = ProcessReport::default();
        self.absorb_synthesized(cx);
        while let Some(q) = self.pending.pop() {
            report.delivered += 1;
            if let InputEvent::Motion(motion) = &q.event {
                report.motion_times = Some((motion.event_time, motion.oldest_event_time()));
            }
            let start = start_stage(&q);
            self.deliver(start.index(), q, cx);
            self.absorb_synthesized(cx);
        }
        report
    }

    /// An async stage finished with a deferred event
    pub fn complete(&mut self, token: DeferredToken, handled: bool, cx: &mut InputContext<'_>) -> Result<()> {
        let unknown = InputError::UnknownDeferredEvent { stage: token.stage, seq: token.seq };
        let index = token.stage.index();
        let deferred = self
            .stages
            .get_mut(index)
            .and_then(|slot| slot.deferred.as_mut())
            .ok_or_else(|| unknown.clone())?;
        let q = deferred.get_mut(token.seq).filter(|q| q.is_deferred()).ok_or_else(|| unknown.clone())?;
        if handled {
            q.flags.insert(QueuedFlags::FINISHED | QueuedFlags::FINISHED_HANDLED);
        }
        tracing::trace!(stage = token.stage.name(), seq = token.seq, handled, "async stage finished event");

        let released = deferred.release(token.seq).ok_or(unknown)?;
        for q in released {
            self.deliver_to_next(index, q, cx);
        }
        self.absorb_synthesized(cx);
        Ok(())
    }

    /// A timer requested by the synthetic stage fired
    pub fn on_timer(&mut self, timer: SyntheticTimer, cx: &mut InputContext<'_>) {
        if let Some(slot) = self.stages.get_mut(StageKind::Synthetic.index()) {
            slot.stage.on_timer(timer, cx);
        }
        self.absorb_synthesized(cx);
    }

    /// Finish every pending and held event as unhandled, without running stages
    pub fn detach(&mut self) {
        let mut dropped = 0;
        while let Some(q) = self.pending.pop() {
            self.finish_input_event(q);
            dropped += 1;
        }
        let held: Vec<_> = self
            .stages
            .iter_mut()
            .filter_map(|slot| slot.deferred.as_mut())
            .flat_map(|deferred| deferred.drain().collect::<Vec<_>>())
            .collect();
        for q in held {
            self.finish_input_event(q);
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "finished input events on detach");
        }
    }

    pub fn dump(&self, prefix: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{prefix}Input pipeline: pending={}", self.pending.len());
        let inner = format!("{prefix}  ");
        for slot in &self.stages {
            slot.stage.dump(&inner, &mut out);
            if let Some(deferred) = &slot.deferred {
                for q in deferred.iter() {
                    let _ = writeln!(
                        out,
                        "{inner}  seq={} device={} deferred={}",
                        q.seq(),
                        q.event.device_id(),
                        q.is_deferred()
                    );
                }
            }
        }
        out
    }

    fn absorb_synthesized(&mut self, cx: &mut InputContext<'_>) {
        for event in std::mem::take(&mut cx.effects.synthesized) {
            self.enqueue(event, None, QueuedFlags::empty());
        }
    }

    fn deliver(&mut self, index: usize, mut q: Box<QueuedInputEvent>, cx: &mut InputContext<'_>) {
        let Some(slot) = self.stages.get_mut(index) else {
            self.finish_input_event(q);
            return;
        };
        if q.is_finished() {
            self.forward(index, q, cx);
            return;
        }
        if slot.stage.should_drop_input_event(&mut q, cx) {
            self.finish(index, q, false, cx);
            return;
        }
        let result = slot.stage.on_process(&mut q, cx);
        match result {
            StageResult::Forward => self.forward(index, q, cx),
            StageResult::FinishHandled => self.finish(index, q, true, cx),
            StageResult::FinishNotHandled => self.finish(index, q, false, cx),
            StageResult::Defer => self.defer(index, q, cx),
        }
    }

    fn defer(&mut self, index: usize, q: Box<QueuedInputEvent>, cx: &mut InputContext<'_>) {
        match self.stages[index].deferred.as_mut() {
            Some(deferred) => deferred.defer(q),
            None => {
                tracing::error!(
                    stage = self.stages[index].stage.kind().name(),
                    seq = q.seq(),
                    "synchronous stage deferred an event"
                );
                self.finish(index, q, false, cx);
            }
        }
    }

    fn finish(&mut self, index: usize, mut q: Box<QueuedInputEvent>, handled: bool, cx: &mut InputContext<'_>) {
        q.flags.insert(QueuedFlags::FINISHED);
        if handled {
            q.flags.insert(QueuedFlags::FINISHED_HANDLED);
        }
        self.forward(index, q, cx);
    }

    fn forward(&mut self, index: usize, q: Box<QueuedInputEvent>, cx: &mut InputContext<'_>) {
        let ready = match self.stages[index].deferred.as_mut() {
            Some(deferred) => deferred.forward(q),
            None => Some(q),
        };
        if let Some(q) = ready {
            self.deliver_to_next(index, q, cx);
        }
    }

    fn deliver_to_next(&mut self, index: usize, mut q: Box<QueuedInputEvent>, cx: &mut InputContext<'_>) {
        self.stages[index].stage.on_deliver_to_next(&mut q, cx);
        self.deliver(index + 1, q, cx);
    }

    fn finish_input_event(&mut self, mut q: Box<QueuedInputEvent>) {
        let handled = q.flags.contains(QueuedFlags::FINISHED_HANDLED);
        tracing::trace!(seq = q.seq(), handled, "input event finished");
        if let Some(receiver) = q.take_receiver() {
            receiver.finish(handled);
        }
        self.pool.recycle(q);
    }
}

fn start_stage(q: &QueuedInputEvent) -> StageKind {
    if q.should_send_to_synthesizer() {
        StageKind::Synthetic
    } else if q.should_skip_ime() {
        StageKind::EarlyPostIme
    } else {
        StageKind::NativePreIme
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::AsyncDispatch;
    use crate::stage::PendingCompletion;
    use crate::testing::{Harness, RecordingReceiver};
    use cadence_platform::{InputSource, Key, KeyAction, KeyEvent};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Native queue that answers post-IME offers from a script
    #[derive(Default)]
    struct ScriptedNative {
        post: Mutex<VecDeque<AsyncDispatch>>,
        held: Mutex<Vec<PendingCompletion>>,
    }

    impl ScriptedNative {
        fn with(answers: &[AsyncDispatch]) -> Arc<Self> {
            Arc::new(Self { post: Mutex::new(answers.iter().copied().collect()), held: Mutex::default() })
        }

        fn token(&self, index: usize) -> DeferredToken {
            self.held.lock()[index].token()
        }
    }

    impl NativeInputQueue for ScriptedNative {
        fn send_input_event(&self, _event: &InputEvent, predispatch: bool, completion: PendingCompletion) -> AsyncDispatch {
            if predispatch {
                return AsyncDispatch::NotHandled;
            }
            let answer = self.post.lock().pop_front().unwrap_or(AsyncDispatch::NotHandled);
            if answer == AsyncDispatch::Pending {
                self.held.lock().push(completion);
            }
            answer
        }
    }

    fn pipeline(native: Option<Arc<ScriptedNative>>) -> InputPipeline {
        let collaborators = InputCollaborators {
            native_queue: native.map(|n| n as Arc<dyn NativeInputQueue>),
            ..Default::default()
        };
        InputPipeline::new(&InputConfig::standard(), collaborators)
    }

    fn key(key: Key, device: i32, time: i64) -> InputEvent {
        KeyEvent::new(KeyAction::Down, key).with_device(device, InputSource::Keyboard).at(time).into()
    }

    fn delivered(harness: &Harness) -> Vec<Key> {
        harness.host.keys.iter().map(|k| k.key).collect()
    }

    #[test]
    fn test_arrival_order_wins_over_timestamps() {
        let mut harness = Harness::new();
        let mut pipeline = pipeline(None);
        pipeline.enqueue(key(Key::A, 1, 300), None, QueuedFlags::empty());
        pipeline.enqueue(key(Key::B, 1, 100), None, QueuedFlags::empty());
        pipeline.enqueue(key(Key::C, 1, 200), None, QueuedFlags::empty());

        let report = pipeline.process_pending(&mut harness.cx());
        assert_eq!(report.delivered, 3);
        assert_eq!(delivered(&harness), vec![Key::A, Key::B, Key::C]);
        assert!(!pipeline.has_pending());
    }

    #[test]
    fn test_receiver_is_told_outcome() {
        let mut harness = Harness::new();
        let receiver = Arc::new(RecordingReceiver::default());
        let mut pipeline = pipeline(None);
        pipeline.enqueue(key(Key::A, 1, 0), Some(ReceiverRef::new(receiver.clone(), 41)), QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());

        harness.host.key_handled = true;
        pipeline.enqueue(key(Key::B, 1, 0), Some(ReceiverRef::new(receiver.clone(), 42)), QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());

        assert_eq!(*receiver.finished.lock(), vec![(41, false), (42, true)]);
    }

    #[test]
    fn test_later_event_from_same_device_waits_for_async_completion() {
        let mut harness = Harness::new();
        let native = ScriptedNative::with(&[AsyncDispatch::Pending, AsyncDispatch::NotHandled]);
        let mut pipeline = pipeline(Some(native.clone()));
        pipeline.enqueue(key(Key::A, 5, 0), None, QueuedFlags::empty());
        pipeline.enqueue(key(Key::B, 5, 0), None, QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());

        // the second event is blocked behind the first at the native stage
        assert!(delivered(&harness).is_empty());
        assert_eq!(pipeline.deferred_len(), 2);

        pipeline.complete(native.token(0), false, &mut harness.cx()).unwrap();
        assert_eq!(delivered(&harness), vec![Key::A, Key::B]);
        assert_eq!(pipeline.deferred_len(), 0);
    }

    #[test]
    fn test_out_of_order_completion_keeps_device_order() {
        let mut harness = Harness::new();
        let native = ScriptedNative::with(&[AsyncDispatch::Pending, AsyncDispatch::Pending]);
        let mut pipeline = pipeline(Some(native.clone()));
        pipeline.enqueue(key(Key::A, 5, 0), None, QueuedFlags::empty());
        pipeline.enqueue(key(Key::B, 5, 0), None, QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());

        pipeline.complete(native.token(1), false, &mut harness.cx()).unwrap();
        assert!(delivered(&harness).is_empty());

        pipeline.complete(native.token(0), false, &mut harness.cx()).unwrap();
        assert_eq!(delivered(&harness), vec![Key::A, Key::B]);
    }

    #[test]
    fn test_other_devices_are_not_blocked() {
        let mut harness = Harness::new();
        let native = ScriptedNative::with(&[AsyncDispatch::Pending, AsyncDispatch::NotHandled]);
        let mut pipeline = pipeline(Some(native.clone()));
        pipeline.enqueue(key(Key::A, 5, 0), None, QueuedFlags::empty());
        pipeline.enqueue(key(Key::B, 6, 0), None, QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());

        assert_eq!(delivered(&harness), vec![Key::B]);
        pipeline.complete(native.token(0), false, &mut harness.cx()).unwrap();
        assert_eq!(delivered(&harness), vec![Key::B, Key::A]);
    }

    #[test]
    fn test_handled_completion_skips_view_tree() {
        let mut harness = Harness::new();
        let receiver = Arc::new(RecordingReceiver::default());
        let native = ScriptedNative::with(&[AsyncDispatch::Pending]);
        let mut pipeline = pipeline(Some(native.clone()));
        pipeline.enqueue(key(Key::A, 5, 0), Some(ReceiverRef::new(receiver.clone(), 7)), QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());

        pipeline.complete(native.token(0), true, &mut harness.cx()).unwrap();
        assert!(delivered(&harness).is_empty());
        assert_eq!(*receiver.finished.lock(), vec![(7, true)]);
    }

    #[test]
    fn test_unknown_completion_is_an_error() {
        let mut harness = Harness::new();
        let mut pipeline = pipeline(None);
        let token = DeferredToken { stage: StageKind::Ime, seq: 99 };
        assert_eq!(
            pipeline.complete(token, true, &mut harness.cx()),
            Err(InputError::UnknownDeferredEvent { stage: StageKind::Ime, seq: 99 })
        );
        let sync = DeferredToken { stage: StageKind::ViewPostIme, seq: 1 };
        assert!(pipeline.complete(sync, true, &mut harness.cx()).is_err());
    }

    #[test]
    fn test_unfocused_key_is_dropped_unhandled() {
        let mut harness = Harness::new();
        harness.state.has_window_focus = false;
        let receiver = Arc::new(RecordingReceiver::default());
        let mut pipeline = pipeline(None);
        pipeline.enqueue(key(Key::A, 1, 0), Some(ReceiverRef::new(receiver.clone(), 3)), QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());

        assert!(harness.host.keys.is_empty());
        assert_eq!(*receiver.finished.lock(), vec![(3, false)]);
    }

    #[test]
    fn test_unhandled_key_gets_fallback_in_same_drain() {
        let mut harness = Harness::new();
        let mut pipeline = pipeline(None);
        pipeline.enqueue_unhandled(key(Key::Escape, 1, 0));
        let report = pipeline.process_pending(&mut harness.cx());

        assert_eq!(report.delivered, 2);
        assert_eq!(delivered(&harness), vec![Key::Back]);
    }

    #[test]
    fn test_pre_ime_view_can_consume() {
        let mut harness = Harness::new();
        harness.host.pre_ime_handled = true;
        let mut pipeline = pipeline(None);
        pipeline.enqueue(key(Key::A, 1, 0), None, QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());
        assert!(harness.host.keys.is_empty());
    }

    #[test]
    fn test_detach_finishes_held_events() {
        let mut harness = Harness::new();
        let receiver = Arc::new(RecordingReceiver::default());
        let native = ScriptedNative::with(&[AsyncDispatch::Pending]);
        let mut pipeline = pipeline(Some(native));
        pipeline.enqueue(key(Key::A, 5, 0), Some(ReceiverRef::new(receiver.clone(), 1)), QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());
        pipeline.enqueue(key(Key::B, 5, 0), Some(ReceiverRef::new(receiver.clone(), 2)), QueuedFlags::empty());

        pipeline.detach();
        let mut finished = receiver.finished.lock().clone();
        finished.sort();
        assert_eq!(finished, vec![(1, false), (2, false)]);
        assert_eq!(pipeline.deferred_len(), 0);
        assert!(!pipeline.has_pending());
    }

    #[test]
    fn test_dump_lists_stages_and_held_events() {
        let mut harness = Harness::new();
        let native = ScriptedNative::with(&[AsyncDispatch::Pending]);
        let mut pipeline = pipeline(Some(native));
        pipeline.enqueue(key(Key::A, 5, 0), None, QueuedFlags::empty());
        pipeline.process_pending(&mut harness.cx());

        let dump = pipeline.dump("");
        assert!(dump.contains("native-post-ime"));
        assert!(dump.contains("seq=1 device=5 deferred=true"));
    }
}
