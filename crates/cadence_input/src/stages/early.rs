//! First stage after the IME: touch mode and pointer coordinate fixups

use std::sync::Arc;

use cadence_platform::{InputEvent, InputSource, KeyEvent, KeyFlags, MotionAction, MotionEvent, SourceClass};

use crate::queued::QueuedInputEvent;
use crate::stage::{is_press, InputContext, InputStage, StageKind, StageResult};
use crate::stages::view::FallbackEventHandler;

pub struct EarlyPostImeStage {
    fallback: Arc<dyn FallbackEventHandler>,
}

impl EarlyPostImeStage {
    pub fn new(fallback: Arc<dyn FallbackEventHandler>) -> Self {
        Self { fallback }
    }

    fn process_key(&self, event: &KeyEvent, cx: &mut InputContext<'_>) -> StageResult {
        if leaves_touch_mode_and_consumes(event, cx) {
            return StageResult::FinishHandled;
        }
        self.fallback.pre_dispatch_key_event(event);
        StageResult::Forward
    }
}

/// Leave touch mode on a navigation or typing key; navigation keys are consumed
/// when leaving touch mode moved focus
fn leaves_touch_mode_and_consumes(event: &KeyEvent, cx: &mut InputContext<'_>) -> bool {
    if !cx.state.in_touch_mode || !is_press(event.action) || event.flags.contains(KeyFlags::KEEP_TOUCH_MODE) {
        return false;
    }
    if event.key.is_navigation() {
        return cx.ensure_touch_mode(false);
    }
    if event.is_typing_key() {
        cx.ensure_touch_mode(false);
    }
    false
}

fn process_pointer(event: &mut MotionEvent, cx: &mut InputContext<'_>) {
    if let Some(scale) = cx.state.compat_inverted_scale {
        event.scale(scale);
    }

    if matches!(event.action, MotionAction::Down | MotionAction::Scroll) {
        cx.ensure_touch_mode(event.source == InputSource::Touchscreen);
    }

    if cx.state.cur_scroll_y != 0 {
        event.offset_location(0.0, cx.state.cur_scroll_y as f32);
    }

    if event.is_touch_event() {
        cx.state.last_touch_point = (event.raw_x(), event.raw_y());
        cx.state.last_touch_source = Some(event.source);
    }
}

impl InputStage for EarlyPostImeStage {
    fn kind(&self) -> StageKind {
        StageKind::EarlyPostIme
    }

    fn on_process(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) -> StageResult {
        match &mut q.event {
            InputEvent::Key(key) => self.process_key(key, cx),
            InputEvent::Motion(motion) if motion.source.is_class(SourceClass::POINTER) => {
                process_pointer(motion, cx);
                StageResult::Forward
            }
            InputEvent::Motion(_) => StageResult::Forward,
        }
    }
}
