//! The input stage contract and the context stages run in

use std::fmt::Write as _;
use std::sync::Arc;

use cadence_platform::{HostView, InputEvent, InputSource, Key, KeyAction, SourceClass};

use crate::queued::QueuedInputEvent;

/// The stages of the chain, in delivery order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    NativePreIme,
    ViewPreIme,
    Ime,
    EarlyPostIme,
    NativePostIme,
    ViewPostIme,
    Synthetic,
}

impl StageKind {
    pub const CHAIN: [StageKind; 7] = [
        StageKind::NativePreIme,
        StageKind::ViewPreIme,
        StageKind::Ime,
        StageKind::EarlyPostIme,
        StageKind::NativePostIme,
        StageKind::ViewPostIme,
        StageKind::Synthetic,
    ];

    /// Position in the chain
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::NativePreIme => "native-pre-ime",
            StageKind::ViewPreIme => "view-pre-ime",
            StageKind::Ime => "ime",
            StageKind::EarlyPostIme => "early-post-ime",
            StageKind::NativePostIme => "native-post-ime",
            StageKind::ViewPostIme => "view-post-ime",
            StageKind::Synthetic => "synthetic",
        }
    }
}

/// Outcome of a stage processing an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageResult {
    /// Pass to the next stage unchanged
    Forward,
    FinishHandled,
    FinishNotHandled,
    /// Hold until an async completion arrives; async stages only
    Defer,
}

// ============================================================================
// Async completion
// ============================================================================

/// Identifies an event deferred at an async stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeferredToken {
    pub stage: StageKind,
    pub seq: u64,
}

/// Where async backends report completions; marshals them to the owner thread
pub trait CompletionSink: Send + Sync {
    fn complete(&self, token: DeferredToken, handled: bool);
}

/// Continuation handed to an async backend
#[derive(Clone)]
pub struct PendingCompletion {
    token: DeferredToken,
    sink: Arc<dyn CompletionSink>,
}

impl PendingCompletion {
    pub fn new(token: DeferredToken, sink: Arc<dyn CompletionSink>) -> Self {
        Self { token, sink }
    }

    pub fn token(&self) -> DeferredToken {
        self.token
    }

    /// Report the outcome; may be called from any thread
    pub fn finish(self, handled: bool) {
        self.sink.complete(self.token, handled);
    }
}

impl std::fmt::Debug for PendingCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PendingCompletion").field(&self.token).finish()
    }
}

/// Synchronous answer of an async backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AsyncDispatch {
    /// The completion will be reported later
    Pending,
    Handled,
    NotHandled,
}

// ============================================================================
// Window-side state and effects
// ============================================================================

/// Window state the stages read and update
#[derive(Clone, Debug, PartialEq)]
pub struct InputState {
    /// The window is added and has a root view
    pub added: bool,
    pub has_window_focus: bool,
    pub stopped: bool,
    pub ambient_mode: bool,
    pub paused_for_transition: bool,
    pub in_touch_mode: bool,
    pub local_focus_mode: bool,
    /// The window is the input method target
    pub ime_target: bool,
    /// Scroll offset applied to pointer events
    pub cur_scroll_y: i32,
    /// Inverse compatibility scale applied to pointer events
    pub compat_inverted_scale: Option<f32>,
    pub last_touch_point: (f32, f32),
    pub last_touch_source: Option<InputSource>,
    /// Pointer events bypass batching
    pub unbuffered_input_dispatch: bool,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            added: false,
            has_window_focus: false,
            stopped: false,
            ambient_mode: false,
            paused_for_transition: false,
            in_touch_mode: false,
            local_focus_mode: false,
            ime_target: false,
            cur_scroll_y: 0,
            compat_inverted_scale: None,
            last_touch_point: (0.0, 0.0),
            last_touch_source: None,
            unbuffered_input_dispatch: false,
        }
    }
}

/// Timers owned by the synthetic stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyntheticTimer {
    JoystickRepeatX,
    JoystickRepeatY,
    TouchNavigationFling,
}

/// Timer change requested by a stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerRequest {
    Schedule { timer: SyntheticTimer, at_nanos: i64 },
    Cancel(SyntheticTimer),
}

/// How batched input consumption should be rescheduled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchRequest {
    /// With the next frame
    NextFrame,
    /// Right away, without waiting for a frame
    Immediately,
}

/// Side effects stages leave for the window to carry out
#[derive(Debug, Default)]
pub struct InputEffects {
    /// Events to enqueue at the tail of the pending queue
    pub synthesized: Vec<InputEvent>,
    pub timers: Vec<TimerRequest>,
    /// Touch mode to report to the compositor
    pub touch_mode: Option<bool>,
    pub consume_batched: Option<BatchRequest>,
}

impl InputEffects {
    pub fn is_empty(&self) -> bool {
        self.synthesized.is_empty()
            && self.timers.is_empty()
            && self.touch_mode.is_none()
            && self.consume_batched.is_none()
    }
}

/// Everything a stage may touch while processing one event
pub struct InputContext<'a> {
    pub host: &'a mut dyn HostView,
    pub state: &'a mut InputState,
    pub effects: &'a mut InputEffects,
    pub completions: &'a Arc<dyn CompletionSink>,
    pub now_nanos: i64,
}

impl InputContext<'_> {
    /// Enqueue a synthesized event
    pub fn synthesize(&mut self, event: impl Into<InputEvent>) {
        self.effects.synthesized.push(event.into());
    }

    pub fn schedule_timer(&mut self, timer: SyntheticTimer, at_nanos: i64) {
        self.effects.timers.push(TimerRequest::Schedule { timer, at_nanos });
    }

    pub fn cancel_timer(&mut self, timer: SyntheticTimer) {
        self.effects.timers.push(TimerRequest::Cancel(timer));
    }

    /// Enter or leave touch mode, telling the compositor; returns whether focus changed
    pub fn ensure_touch_mode(&mut self, in_touch_mode: bool) -> bool {
        if self.state.in_touch_mode == in_touch_mode {
            return false;
        }
        self.effects.touch_mode = Some(in_touch_mode);
        apply_touch_mode_locally(self.state, self.host, in_touch_mode)
    }

    /// Completion for an event deferred at `stage`
    pub fn completion(&self, stage: StageKind, q: &QueuedInputEvent) -> PendingCompletion {
        PendingCompletion::new(DeferredToken { stage, seq: q.seq() }, Arc::clone(self.completions))
    }
}

/// Switch touch mode without notifying the compositor
pub fn apply_touch_mode_locally(state: &mut InputState, host: &mut dyn HostView, in_touch_mode: bool) -> bool {
    if state.in_touch_mode == in_touch_mode {
        return false;
    }
    state.in_touch_mode = in_touch_mode;
    host.on_touch_mode_changed(in_touch_mode)
}

fn is_back_key(event: &InputEvent) -> bool {
    matches!(event, InputEvent::Key(key) if key.key == Key::Back)
}

/// Decide whether the window can take an event in its current state
///
/// Terminal events are never dropped; they are canceled and kept so gesture
/// state downstream can be released.
pub fn should_drop_input_event(q: &mut QueuedInputEvent, state: &InputState) -> bool {
    if !state.added {
        tracing::warn!(event = ?q.event, "Dropping event due to root view being removed");
        return true;
    }

    let unfocused = !state.has_window_focus && !q.event.is_from_class(SourceClass::POINTER);
    let ambient = state.ambient_mode && !q.event.is_from_class(SourceClass::BUTTON);
    let paused = state.paused_for_transition && !is_back_key(&q.event);
    if unfocused || state.stopped || ambient || paused {
        if q.event.is_terminal() {
            q.event.cancel();
            tracing::warn!(event = ?q.event, "Cancelling event due to no window focus");
            return false;
        }
        tracing::warn!(event = ?q.event, "Dropping event due to no window focus");
        return true;
    }
    false
}

/// A stage of the input chain
pub trait InputStage {
    fn kind(&self) -> StageKind;

    /// Whether the stage may return [`StageResult::Defer`]
    fn is_async(&self) -> bool {
        false
    }

    fn on_process(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) -> StageResult;

    /// Called as an event leaves this stage for the next one
    fn on_deliver_to_next(&mut self, _q: &mut QueuedInputEvent, _cx: &mut InputContext<'_>) {}

    fn should_drop_input_event(&self, q: &mut QueuedInputEvent, cx: &InputContext<'_>) -> bool {
        should_drop_input_event(q, cx.state)
    }

    /// A timer requested by this stage fired
    fn on_timer(&mut self, _timer: SyntheticTimer, _cx: &mut InputContext<'_>) {}

    fn dump(&self, prefix: &str, out: &mut String) {
        let _ = writeln!(out, "{prefix}{}", self.kind().name());
    }
}

/// Whether a key event is a down or multiple press
pub(crate) fn is_press(action: KeyAction) -> bool {
    matches!(action, KeyAction::Down | KeyAction::Multiple)
}
