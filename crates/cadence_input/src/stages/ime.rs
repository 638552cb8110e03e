//! Input method stage

use std::fmt::Write as _;
use std::sync::Arc;

use cadence_platform::InputEvent;

use crate::queued::QueuedInputEvent;
use crate::stage::{AsyncDispatch, InputContext, InputStage, PendingCompletion, StageKind, StageResult};

/// Connection to the input method
pub trait ImeSession: Send + Sync {
    fn dispatch_input_event(&self, event: &InputEvent, completion: PendingCompletion) -> AsyncDispatch;
}

/// Offers events to the IME when the window is its target
pub struct ImeStage {
    ime: Option<Arc<dyn ImeSession>>,
}

impl ImeStage {
    pub fn new(ime: Option<Arc<dyn ImeSession>>) -> Self {
        Self { ime }
    }
}

impl InputStage for ImeStage {
    fn kind(&self) -> StageKind {
        StageKind::Ime
    }

    fn is_async(&self) -> bool {
        true
    }

    fn on_process(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) -> StageResult {
        if !cx.state.ime_target || cx.state.local_focus_mode {
            return StageResult::Forward;
        }
        let Some(ime) = &self.ime else {
            return StageResult::Forward;
        };
        match ime.dispatch_input_event(&q.event, cx.completion(self.kind(), q)) {
            AsyncDispatch::Handled => StageResult::FinishHandled,
            // the IME could not handle it, skip along to the next stage
            AsyncDispatch::NotHandled => StageResult::Forward,
            AsyncDispatch::Pending => StageResult::Defer,
        }
    }

    fn dump(&self, prefix: &str, out: &mut String) {
        let _ = writeln!(out, "{prefix}{} (connected: {})", self.kind().name(), self.ime.is_some());
    }
}
