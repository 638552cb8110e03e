//! Messages delivered on the UI thread

use cadence_frame::ClockMessage;
use cadence_input::{DeferredToken, ReceiverRef, SyntheticTimer};
use cadence_platform::{InputEvent, WindowEvent};

use crate::ui_thread::WindowId;

/// Frame action `what` that runs a window's traversal
pub const WHAT_TRAVERSAL: u32 = 1;
/// Frame action `what` that consumes a window's batched motion input
pub const WHAT_CONSUME_BATCHED_INPUT: u32 = 2;

/// Everything the UI thread's message queue carries
#[derive(Debug)]
pub enum UiMessage {
    /// Work for the frame clock
    Clock(ClockMessage),
    /// Work for one window, dropped if the window is gone
    Window { id: WindowId, message: WindowMessage },
}

/// Work addressed to a window
#[derive(Debug)]
pub enum WindowMessage {
    /// A compositor notification
    Event(WindowEvent),
    /// An input event from the platform receiver
    Input { event: InputEvent, receiver: Option<ReceiverRef> },
    /// An async input stage reported its outcome
    InputStageFinished { token: DeferredToken, handled: bool },
    /// Drain the pending input queue
    ProcessInputEvents,
    /// Consume batched motion without waiting for a frame
    ConsumeBatchedInputImmediately,
    /// A synthetic input timer fired
    SyntheticTimer(SyntheticTimer),
    /// Re-issue layout requests deferred by the last traversal
    RunQueue,
    /// Tear the window down
    Die,
}

impl WindowMessage {
    /// Whether synchronous barriers hold this message back
    ///
    /// Input and its completions flow past traversal barriers.
    pub fn is_asynchronous(&self) -> bool {
        matches!(
            self,
            WindowMessage::Input { .. }
                | WindowMessage::InputStageFinished { .. }
                | WindowMessage::ProcessInputEvents
                | WindowMessage::ConsumeBatchedInputImmediately
                | WindowMessage::SyntheticTimer(_)
        )
    }
}
