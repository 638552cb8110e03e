//! Delivery to the view tree, before and after the IME

use std::fmt::Write as _;
use std::sync::Arc;

use cadence_platform::{FocusDirection, InputEvent, Key, KeyAction, KeyEvent, MotionEvent, SourceClass};

use crate::queued::QueuedInputEvent;
use crate::stage::{should_drop_input_event, BatchRequest, InputContext, InputStage, StageKind, StageResult};

/// Policy for keys nothing in the view tree handled
pub trait FallbackEventHandler: Send + Sync {
    /// Observe a key about to be delivered to the view tree
    fn pre_dispatch_key_event(&self, _event: &KeyEvent) {}

    /// Handle a key the view tree did not
    fn dispatch_key_event(&self, _event: &KeyEvent) -> bool {
        false
    }
}

/// Fallback handler that handles nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFallback;

impl FallbackEventHandler for NoFallback {}

/// Offers key events to the view tree before the IME sees them
#[derive(Debug, Default)]
pub struct ViewPreImeStage;

impl InputStage for ViewPreImeStage {
    fn kind(&self) -> StageKind {
        StageKind::ViewPreIme
    }

    fn on_process(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) -> StageResult {
        match &q.event {
            InputEvent::Key(key) if cx.host.dispatch_key_event_pre_ime(key) => StageResult::FinishHandled,
            _ => StageResult::Forward,
        }
    }
}

/// Full dispatch to the view tree
pub struct ViewPostImeStage {
    fallback: Arc<dyn FallbackEventHandler>,
}

impl ViewPostImeStage {
    pub fn new(fallback: Arc<dyn FallbackEventHandler>) -> Self {
        Self { fallback }
    }

    fn process_key(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) -> StageResult {
        let InputEvent::Key(event) = &q.event else {
            return StageResult::Forward;
        };
        let event = event.clone();

        if cx.host.dispatch_key_event(&event) {
            return StageResult::FinishHandled;
        }
        if should_drop_input_event(q, cx.state) {
            return StageResult::FinishNotHandled;
        }

        // ctrl held: try the key as a shortcut
        if event.action == KeyAction::Down
            && event.modifiers.ctrl
            && event.repeat_count == 0
            && !event.key.is_modifier()
        {
            if cx.host.dispatch_key_shortcut_event(&event) {
                return StageResult::FinishHandled;
            }
            if should_drop_input_event(q, cx.state) {
                return StageResult::FinishNotHandled;
            }
        }

        if self.fallback.dispatch_key_event(&event) {
            return StageResult::FinishHandled;
        }
        if should_drop_input_event(q, cx.state) {
            return StageResult::FinishNotHandled;
        }

        if event.action == KeyAction::Down {
            if let Some(direction) = focus_direction(&event) {
                if cx.host.move_focus(direction) {
                    return StageResult::FinishHandled;
                }
                // last chance for the focused node to take the move
                if cx.host.has_focused_view() && cx.host.dispatch_unhandled_move(direction) {
                    return StageResult::FinishHandled;
                }
            }
        }
        StageResult::Forward
    }

    fn process_pointer(&mut self, event: &MotionEvent, cx: &mut InputContext<'_>) -> StageResult {
        let handled = cx.host.dispatch_pointer_event(event);
        if cx.host.take_unbuffered_dispatch_request() && !cx.state.unbuffered_input_dispatch {
            cx.state.unbuffered_input_dispatch = true;
            cx.effects.consume_batched = Some(BatchRequest::Immediately);
        }
        finish_if(handled)
    }
}

fn finish_if(handled: bool) -> StageResult {
    if handled {
        StageResult::FinishHandled
    } else {
        StageResult::Forward
    }
}

fn focus_direction(event: &KeyEvent) -> Option<FocusDirection> {
    let plain = event.modifiers.is_empty();
    match event.key {
        Key::Left if plain => Some(FocusDirection::Left),
        Key::Right if plain => Some(FocusDirection::Right),
        Key::Up if plain => Some(FocusDirection::Up),
        Key::Down if plain => Some(FocusDirection::Down),
        Key::Tab if plain => Some(FocusDirection::Forward),
        Key::Tab if event.modifiers.shift_only() => Some(FocusDirection::Backward),
        _ => None,
    }
}

impl InputStage for ViewPostImeStage {
    fn kind(&self) -> StageKind {
        StageKind::ViewPostIme
    }

    fn on_process(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) -> StageResult {
        let motion = match &q.event {
            InputEvent::Key(_) => return self.process_key(q, cx),
            InputEvent::Motion(motion) => motion.clone(),
        };
        if motion.source.is_class(SourceClass::POINTER) {
            self.process_pointer(&motion, cx)
        } else if motion.source.is_class(SourceClass::TRACKBALL) {
            finish_if(cx.host.dispatch_trackball_event(&motion))
        } else {
            finish_if(cx.host.dispatch_generic_motion_event(&motion))
        }
    }

    fn on_deliver_to_next(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) {
        let terminal_touch = matches!(&q.event, InputEvent::Motion(m) if m.is_touch_event()) && q.event.is_terminal();
        if cx.state.unbuffered_input_dispatch && terminal_touch {
            cx.state.unbuffered_input_dispatch = false;
            cx.effects.consume_batched = Some(BatchRequest::NextFrame);
        }
    }

    fn dump(&self, prefix: &str, out: &mut String) {
        let _ = writeln!(out, "{prefix}{}", self.kind().name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queued::{EventPool, QueuedFlags};
    use crate::testing::Harness;
    use cadence_platform::{InputSource, Modifiers, MotionAction};

    fn queued(event: impl Into<InputEvent>) -> Box<QueuedInputEvent> {
        EventPool::new(0).obtain(1, event.into(), None, QueuedFlags::empty())
    }

    fn post_ime() -> ViewPostImeStage {
        ViewPostImeStage::new(Arc::new(NoFallback))
    }

    #[test]
    fn test_ctrl_key_is_offered_as_shortcut() {
        let mut harness = Harness::new();
        harness.host.shortcut_handled = true;
        let mut q = queued(KeyEvent::new(KeyAction::Down, Key::S).with_modifiers(Modifiers::CTRL));
        assert_eq!(post_ime().on_process(&mut q, &mut harness.cx()), StageResult::FinishHandled);
        assert_eq!(harness.host.shortcuts.len(), 1);
    }

    #[test]
    fn test_repeated_ctrl_key_is_not_a_shortcut() {
        let mut harness = Harness::new();
        let event = KeyEvent::new(KeyAction::Down, Key::S).with_modifiers(Modifiers::CTRL).repeated(10, 1);
        let mut q = queued(event);
        assert_eq!(post_ime().on_process(&mut q, &mut harness.cx()), StageResult::Forward);
        assert!(harness.host.shortcuts.is_empty());
    }

    #[test]
    fn test_unhandled_arrow_moves_focus() {
        let mut harness = Harness::new();
        harness.host.move_focus_handled = true;
        let mut q = queued(KeyEvent::new(KeyAction::Down, Key::Right));
        assert_eq!(post_ime().on_process(&mut q, &mut harness.cx()), StageResult::FinishHandled);
        assert_eq!(harness.host.focus_moves, vec![FocusDirection::Right]);
    }

    #[test]
    fn test_shift_tab_moves_backward() {
        let mut harness = Harness::new();
        let shift = Modifiers { shift: true, ..Default::default() };
        let mut q = queued(KeyEvent::new(KeyAction::Down, Key::Tab).with_modifiers(shift));
        post_ime().on_process(&mut q, &mut harness.cx());
        assert_eq!(harness.host.focus_moves, vec![FocusDirection::Backward]);
    }

    #[test]
    fn test_key_up_does_not_move_focus() {
        let mut harness = Harness::new();
        let mut q = queued(KeyEvent::new(KeyAction::Up, Key::Left));
        assert_eq!(post_ime().on_process(&mut q, &mut harness.cx()), StageResult::Forward);
        assert!(harness.host.focus_moves.is_empty());
    }

    #[test]
    fn test_unbuffered_dispatch_until_gesture_ends() {
        let mut harness = Harness::new();
        let mut stage = post_ime();
        harness.host.request_unbuffered = true;
        let mut down = queued(MotionEvent::new(InputSource::Touchscreen, MotionAction::Down, 1.0, 1.0));
        stage.on_process(&mut down, &mut harness.cx());
        assert!(harness.state.unbuffered_input_dispatch);
        assert_eq!(harness.effects.consume_batched, Some(BatchRequest::Immediately));

        let mut up = queued(MotionEvent::new(InputSource::Touchscreen, MotionAction::Up, 1.0, 1.0));
        stage.on_process(&mut up, &mut harness.cx());
        stage.on_deliver_to_next(&mut up, &mut harness.cx());
        assert!(!harness.state.unbuffered_input_dispatch);
        assert_eq!(harness.effects.consume_batched, Some(BatchRequest::NextFrame));
    }

    #[test]
    fn test_pre_ime_ignores_motion() {
        let mut harness = Harness::new();
        harness.host.pre_ime_handled = true;
        let mut q = queued(MotionEvent::new(InputSource::Mouse, MotionAction::Move, 0.0, 0.0));
        assert_eq!(ViewPreImeStage.on_process(&mut q, &mut harness.cx()), StageResult::Forward);
    }
}
