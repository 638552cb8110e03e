//! Fakes shared by the unit tests

use std::sync::Arc;

use parking_lot::Mutex;

use cadence_platform::{
    Canvas, FocusDirection, HostView, KeyEvent, LayoutPass, MeasureSpec, MeasuredSize, MotionEvent, NodeId, Rect,
    Visibility, WindowInsets,
};

use crate::queued::InputEventReceiver;
use crate::stage::{CompletionSink, DeferredToken, InputContext, InputEffects, InputState};

/// Host view that records what it was offered
#[derive(Default)]
pub struct TestHost {
    pub pre_ime_handled: bool,
    pub key_handled: bool,
    pub shortcut_handled: bool,
    pub pointer_handled: bool,
    pub move_focus_handled: bool,
    pub focused: bool,
    pub request_unbuffered: bool,
    pub keys: Vec<KeyEvent>,
    pub shortcuts: Vec<KeyEvent>,
    pub pointers: Vec<MotionEvent>,
    pub focus_moves: Vec<FocusDirection>,
    pub touch_mode_changes: Vec<bool>,
}

impl HostView for TestHost {
    fn measure(&mut self, width: MeasureSpec, height: MeasureSpec) -> MeasuredSize {
        MeasuredSize { width: width.size, height: height.size, too_small: false }
    }

    fn measured_size(&self) -> MeasuredSize {
        MeasuredSize::default()
    }

    fn layout(&mut self, _frame: Rect, _pass: &mut LayoutPass) {}

    fn draw(&mut self, _canvas: &mut dyn Canvas) {}

    fn visibility(&self) -> Visibility {
        Visibility::Visible
    }

    fn is_attached(&self, _node: NodeId) -> bool {
        true
    }

    fn has_gone_ancestor(&self, _node: NodeId) -> bool {
        false
    }

    fn is_force_layout(&self, _node: NodeId) -> bool {
        false
    }

    fn clear_force_layout(&mut self, _node: NodeId) {}

    fn request_layout(&mut self, _node: NodeId) {}

    fn dispatch_apply_insets(&mut self, _insets: &WindowInsets) {}

    fn on_touch_mode_changed(&mut self, in_touch_mode: bool) -> bool {
        self.touch_mode_changes.push(in_touch_mode);
        true
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn move_focus(&mut self, direction: FocusDirection) -> bool {
        self.focus_moves.push(direction);
        self.move_focus_handled
    }

    fn dispatch_key_event_pre_ime(&mut self, _event: &KeyEvent) -> bool {
        self.pre_ime_handled
    }

    fn dispatch_key_event(&mut self, event: &KeyEvent) -> bool {
        self.keys.push(event.clone());
        self.key_handled
    }

    fn dispatch_key_shortcut_event(&mut self, event: &KeyEvent) -> bool {
        self.shortcuts.push(event.clone());
        self.shortcut_handled
    }

    fn dispatch_pointer_event(&mut self, event: &MotionEvent) -> bool {
        self.pointers.push(event.clone());
        self.pointer_handled
    }

    fn take_unbuffered_dispatch_request(&mut self) -> bool {
        std::mem::take(&mut self.request_unbuffered)
    }
}

/// Completion sink that records completions
#[derive(Default)]
pub struct RecordingSink {
    pub completions: Mutex<Vec<(DeferredToken, bool)>>,
}

impl CompletionSink for RecordingSink {
    fn complete(&self, token: DeferredToken, handled: bool) {
        self.completions.lock().push((token, handled));
    }
}

/// Receiver that records finished sequence numbers
#[derive(Default)]
pub struct RecordingReceiver {
    pub finished: Mutex<Vec<(u64, bool)>>,
}

impl InputEventReceiver for RecordingReceiver {
    fn finish_input_event(&self, seq: u64, handled: bool) {
        self.finished.lock().push((seq, handled));
    }
}

/// Route test logs through the test harness; `RUST_LOG` selects what shows
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Owns everything an [`InputContext`] borrows
pub struct Harness {
    pub host: TestHost,
    pub state: InputState,
    pub effects: InputEffects,
    pub sink: Arc<dyn CompletionSink>,
    pub now_nanos: i64,
}

impl Harness {
    /// An added, focused window
    pub fn new() -> Self {
        init_tracing();
        Self {
            host: TestHost::default(),
            state: InputState { added: true, has_window_focus: true, ..Default::default() },
            effects: InputEffects::default(),
            sink: Arc::new(RecordingSink::default()),
            now_nanos: 0,
        }
    }

    pub fn cx(&mut self) -> InputContext<'_> {
        InputContext {
            host: &mut self.host,
            state: &mut self.state,
            effects: &mut self.effects,
            completions: &self.sink,
            now_nanos: self.now_nanos,
        }
    }

    /// Synthesized key events, drained
    pub fn take_keys(&mut self) -> Vec<KeyEvent> {
        self.effects
            .synthesized
            .drain(..)
            .filter_map(|event| event.as_key().cloned())
            .collect()
    }
}
