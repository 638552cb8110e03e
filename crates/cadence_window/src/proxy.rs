//! Cross-thread handle to a window
//!
//! The compositor, input receivers and async input backends live on other
//! threads. They reach a window through a [`WindowProxy`], which only knows
//! the window's id and the UI thread's queue. The UI thread looks the id up
//! when the message is delivered and drops it if the window is gone.

use cadence_frame::MessageQueue;
use cadence_input::{CompletionSink, DeferredToken, ReceiverRef};
use cadence_platform::{DisplayMetrics, InputEvent, ResizeReport, WindowEvent};

use crate::error::{Result, WindowError};
use crate::messages::{UiMessage, WindowMessage};
use crate::ui_thread::WindowId;

/// Sendable handle that posts work to a window's UI thread
#[derive(Clone)]
pub struct WindowProxy {
    id: WindowId,
    queue: MessageQueue<UiMessage>,
}

impl WindowProxy {
    pub(crate) fn new(id: WindowId, queue: MessageQueue<UiMessage>) -> Self {
        Self { id, queue }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Post a message; fails once the UI thread has quit
    pub fn send(&self, message: WindowMessage) -> Result<()> {
        let asynchronous = message.is_asynchronous();
        let message = UiMessage::Window { id: self.id, message };
        let posted = if asynchronous { self.queue.post_async(message) } else { self.queue.post(message) };
        if posted {
            Ok(())
        } else {
            Err(WindowError::WindowGone)
        }
    }

    pub fn send_event(&self, event: WindowEvent) -> Result<()> {
        self.send(WindowMessage::Event(event))
    }

    // ========================================================================
    // Compositor notifications
    // ========================================================================

    pub fn resized(&self, report: ResizeReport) -> Result<()> {
        self.send_event(WindowEvent::Resized(report))
    }

    pub fn moved(&self, x: i32, y: i32) -> Result<()> {
        self.send_event(WindowEvent::Moved { x, y })
    }

    pub fn window_focus_changed(&self, has_focus: bool, in_touch_mode: bool) -> Result<()> {
        self.send_event(WindowEvent::FocusChanged { has_focus, in_touch_mode })
    }

    pub fn app_visibility_changed(&self, visible: bool) -> Result<()> {
        self.send_event(WindowEvent::AppVisibilityChanged(visible))
    }

    pub fn get_new_surface(&self) -> Result<()> {
        self.send_event(WindowEvent::GetNewSurface)
    }

    pub fn display_changed(&self, metrics: DisplayMetrics) -> Result<()> {
        self.send_event(WindowEvent::DisplayChanged(metrics))
    }

    pub fn close(&self) -> Result<()> {
        self.send_event(WindowEvent::CloseRequested)
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Deliver an input event from the platform receiver
    pub fn dispatch_input_event(&self, event: InputEvent, receiver: Option<ReceiverRef>) -> Result<()> {
        self.send(WindowMessage::Input { event, receiver })
    }
}

impl CompletionSink for WindowProxy {
    fn complete(&self, token: DeferredToken, handled: bool) {
        if self.send(WindowMessage::InputStageFinished { token, handled }).is_err() {
            tracing::debug!(window = ?self.id, seq = token.seq, "input completion after the UI thread quit");
        }
    }
}

impl std::fmt::Debug for WindowProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowProxy").field("id", &self.id).finish_non_exhaustive()
    }
}
