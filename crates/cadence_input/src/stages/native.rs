//! Hand-off to the embedder's native event queue

use std::sync::Arc;

use cadence_platform::InputEvent;

use crate::queued::QueuedInputEvent;
use crate::stage::{AsyncDispatch, InputContext, InputStage, PendingCompletion, StageKind, StageResult};

/// Native code that sees events before or after the view tree
pub trait NativeInputQueue: Send + Sync {
    /// Offer an event; `predispatch` is true before the IME has seen it
    fn send_input_event(&self, event: &InputEvent, predispatch: bool, completion: PendingCompletion) -> AsyncDispatch;
}

fn dispatch(
    queue: &dyn NativeInputQueue,
    kind: StageKind,
    predispatch: bool,
    q: &QueuedInputEvent,
    cx: &InputContext<'_>,
) -> StageResult {
    match queue.send_input_event(&q.event, predispatch, cx.completion(kind, q)) {
        AsyncDispatch::Pending => StageResult::Defer,
        AsyncDispatch::Handled => StageResult::FinishHandled,
        AsyncDispatch::NotHandled => StageResult::Forward,
    }
}

/// Offers key events to the native queue before the IME
pub struct NativePreImeStage {
    queue: Option<Arc<dyn NativeInputQueue>>,
}

impl NativePreImeStage {
    pub fn new(queue: Option<Arc<dyn NativeInputQueue>>) -> Self {
        Self { queue }
    }
}

impl InputStage for NativePreImeStage {
    fn kind(&self) -> StageKind {
        StageKind::NativePreIme
    }

    fn is_async(&self) -> bool {
        true
    }

    fn on_process(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) -> StageResult {
        match &self.queue {
            Some(queue) if matches!(q.event, InputEvent::Key(_)) => {
                dispatch(queue.as_ref(), self.kind(), true, q, cx)
            }
            _ => StageResult::Forward,
        }
    }
}

/// Offers every event to the native queue after the IME
pub struct NativePostImeStage {
    queue: Option<Arc<dyn NativeInputQueue>>,
}

impl NativePostImeStage {
    pub fn new(queue: Option<Arc<dyn NativeInputQueue>>) -> Self {
        Self { queue }
    }
}

impl InputStage for NativePostImeStage {
    fn kind(&self) -> StageKind {
        StageKind::NativePostIme
    }

    fn is_async(&self) -> bool {
        true
    }

    fn on_process(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) -> StageResult {
        match &self.queue {
            Some(queue) => dispatch(queue.as_ref(), self.kind(), false, q, cx),
            None => StageResult::Forward,
        }
    }
}
