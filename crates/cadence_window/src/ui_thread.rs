//! UI thread
//!
//! A [`UiThread`] owns one message queue, one frame clock and every window
//! created on it. Messages for a window carry its [`WindowId`]; ids are
//! generational, so a message for a window that has since been removed finds
//! nothing and is dropped.

use std::fmt::Write as _;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use slotmap::{new_key_type, SlotMap};

use cadence_frame::{ClockMessage, ClockPort, FrameAction, FrameClock, MessageQueue, PostTime, TimeSource, VsyncSource};

use crate::config::WindowConfig;
use crate::error::{Result, WindowError};
use crate::messages::UiMessage;
use crate::proxy::WindowProxy;
use crate::view_root::{ViewRoot, WindowSetup};

new_key_type! {
    /// Generational handle to a window on its UI thread
    pub struct WindowId;
}

impl WindowId {
    /// Raw value used as a frame action target
    pub fn to_raw(&self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }

    pub fn from_raw(raw: u64) -> Self {
        slotmap::KeyData::from_ffi(raw).into()
    }
}

/// Delivers the frame clock's messages through the UI queue
struct UiClockPort {
    queue: MessageQueue<UiMessage>,
    owner: ThreadId,
}

impl ClockPort for UiClockPort {
    fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn post(&self, message: ClockMessage, at: PostTime) {
        let posted = match at {
            PostTime::Front => self.queue.post_at_front(UiMessage::Clock(message), true),
            PostTime::At(when) => self.queue.post_at(when, UiMessage::Clock(message), true),
        };
        if !posted {
            tracing::debug!("UI thread is quitting, clock message dropped");
        }
    }

    fn remove_scheduled_callbacks(&self, action: &FrameAction) {
        self.queue
            .remove_where(|m| matches!(m, UiMessage::Clock(message) if message.is_schedule_for(action)));
    }
}

/// The thread windows live on
pub struct UiThread {
    queue: MessageQueue<UiMessage>,
    clock: Arc<FrameClock>,
    windows: SlotMap<WindowId, ViewRoot>,
    config: WindowConfig,
}

impl UiThread {
    /// Create the UI thread state on the calling thread, which becomes its owner
    pub fn new(config: WindowConfig, time: Arc<dyn TimeSource>, vsync: Arc<dyn VsyncSource>) -> Self {
        let queue = MessageQueue::new(time.clone());
        let port = Arc::new(UiClockPort { queue: queue.clone(), owner: thread::current().id() });
        let clock = Arc::new(FrameClock::new(config.frame.clone(), time, vsync, port));
        Self { queue, clock, windows: SlotMap::with_key(), config }
    }

    pub fn clock(&self) -> &Arc<FrameClock> {
        &self.clock
    }

    pub fn queue(&self) -> &MessageQueue<UiMessage> {
        &self.queue
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    // ========================================================================
    // Windows
    // ========================================================================

    /// Create a window and add it to the display
    pub fn add_window(&mut self, setup: WindowSetup) -> Result<WindowId> {
        let clock = Arc::clone(&self.clock);
        let queue = self.queue.clone();
        let config = &self.config;
        let id = self.windows.insert_with_key(|id| ViewRoot::new(id, setup, config, clock, queue));
        if let Err(e) = self.windows[id].add() {
            self.windows.remove(id);
            return Err(e);
        }
        Ok(id)
    }

    pub fn window(&self, id: WindowId) -> Result<&ViewRoot> {
        self.windows.get(id).ok_or(WindowError::WindowGone)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Result<&mut ViewRoot> {
        self.windows.get_mut(id).ok_or(WindowError::WindowGone)
    }

    pub fn proxy(&self, id: WindowId) -> Result<WindowProxy> {
        self.window(id).map(ViewRoot::proxy)
    }

    /// Remove a window immediately
    pub fn remove_window(&mut self, id: WindowId) -> Result<()> {
        let mut window = self.windows.remove(id).ok_or(WindowError::WindowGone)?;
        window.die();
        Ok(())
    }

    // ========================================================================
    // Message loop
    // ========================================================================

    /// Handle one message on the owner thread
    pub fn dispatch(&mut self, message: UiMessage) {
        match message {
            UiMessage::Clock(message) => {
                let clock = Arc::clone(&self.clock);
                let windows = &mut self.windows;
                clock.handle_message(message, &mut |target, frame_time_nanos| {
                    let id = WindowId::from_raw(target.target);
                    let Some(window) = windows.get_mut(id) else {
                        tracing::debug!(window = ?id, what = target.what, "frame action for a removed window");
                        return;
                    };
                    window.on_frame_action(target.what, frame_time_nanos);
                    if window.is_removed() {
                        windows.remove(id);
                    }
                });
            }
            UiMessage::Window { id, message } => {
                let Some(window) = self.windows.get_mut(id) else {
                    tracing::debug!(window = ?id, ?message, "message for a removed window dropped");
                    return;
                };
                window.handle_message(message);
                if window.is_removed() {
                    self.windows.remove(id);
                }
            }
        }
    }

    /// Handle every message due now; returns how many were handled
    pub fn run_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.queue.poll() {
            self.dispatch(message);
            handled += 1;
        }
        handled
    }

    /// Handle messages until [`quit`](Self::quit) is called
    pub fn run(&mut self) {
        tracing::debug!(windows = self.windows.len(), "UI thread loop started");
        while !self.queue.is_quitting() {
            if let Some(message) = self.queue.wait(Duration::from_millis(100)) {
                self.dispatch(message);
            }
        }
        tracing::debug!("UI thread loop stopped");
    }

    /// Remove every window and stop the loop
    pub fn quit(&mut self) {
        let ids: Vec<WindowId> = self.windows.keys().collect();
        for id in ids {
            if let Some(mut window) = self.windows.remove(id) {
                window.die();
            }
        }
        self.queue.quit();
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "UiThread: {} windows, {} queued messages", self.windows.len(), self.queue.len());
        out.push_str(&self.clock.dump("  "));
        for window in self.windows.values() {
            out.push_str(&window.dump("  "));
        }
        out
    }
}

impl std::fmt::Debug for UiThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiThread")
            .field("windows", &self.windows.len())
            .field("queued", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use cadence_frame::NANOS_PER_MS;

    use super::*;
    use crate::messages::WindowMessage;
    use crate::testing::{Harness, TestWindow};

    #[test]
    fn test_window_id_raw_round_trip() {
        let mut windows: SlotMap<WindowId, ()> = SlotMap::with_key();
        let id = windows.insert(());
        assert_eq!(WindowId::from_raw(id.to_raw()), id);
    }

    #[test]
    fn test_first_frame_runs_from_vsync() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        assert_eq!(harness.vsync.requests(), 1);
        assert!(harness.ui.clock().is_frame_scheduled());

        harness.frame();

        assert_eq!(harness.ui.clock().stats().frames, 1);
        assert_eq!(harness.ui.window(id).unwrap().stats().traversals, 1);
    }

    #[test]
    fn test_windows_traverse_independently() {
        let mut harness = Harness::new();
        let first = TestWindow::new();
        let second = TestWindow::new();
        let a = harness.add(first.setup);
        let b = harness.add(second.setup);
        harness.frames(2);

        harness.ui.window_mut(b).unwrap().request_layout();
        harness.frame();

        assert_eq!(harness.ui.window(a).unwrap().stats().traversals, 2);
        assert_eq!(harness.ui.window(b).unwrap().stats().traversals, 3);
        assert_eq!(harness.ui.clock().stats().frames, 3);
    }

    #[test]
    fn test_removed_window_is_gone() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        let proxy = harness.ui.proxy(id).unwrap();

        harness.ui.remove_window(id).unwrap();

        assert_eq!(harness.ui.window(id).unwrap_err(), WindowError::WindowGone);
        assert_eq!(harness.ui.remove_window(id), Err(WindowError::WindowGone));
        assert_eq!(window.session.removed.load(Ordering::SeqCst), 1);

        // late messages for the old id are dropped on delivery
        proxy.moved(10, 10).unwrap();
        harness.ui.run_pending();
        harness.frame();
        assert_eq!(harness.ui.window_count(), 0);
        assert_eq!(window.session.relayout_count(), 0);
    }

    #[test]
    fn test_slot_reuse_does_not_revive_old_id() {
        let mut harness = Harness::new();
        let old = TestWindow::new();
        let old_id = harness.add(old.setup);
        harness.ui.remove_window(old_id).unwrap();

        let new = TestWindow::new();
        let new_id = harness.add(new.setup);

        assert_ne!(old_id, new_id);
        assert!(harness.ui.window(old_id).is_err());
        assert!(harness.ui.window(new_id).is_ok());
    }

    #[test]
    fn test_close_request_removes_window() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);

        harness.ui.proxy(id).unwrap().close().unwrap();
        harness.ui.run_pending();

        assert_eq!(harness.ui.window_count(), 0);
        assert_eq!(window.host.lock().detached, 1);
    }

    #[test]
    fn test_events_wait_behind_scheduled_traversal() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);
        harness.ui.window_mut(id).unwrap().request_layout();

        harness.ui.proxy(id).unwrap().send(WindowMessage::Die).unwrap();
        harness.ui.run_pending();
        assert_eq!(harness.ui.window_count(), 1);

        harness.frame();
        assert_eq!(harness.ui.window_count(), 0);
        assert_eq!(window.host.lock().layouts.len(), 2);
    }

    #[test]
    fn test_quit_removes_windows_and_stops_posting() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        let proxy = harness.ui.proxy(id).unwrap();

        harness.ui.quit();

        assert_eq!(harness.ui.window_count(), 0);
        assert_eq!(window.session.removed.load(Ordering::SeqCst), 1);
        assert_eq!(proxy.moved(1, 1), Err(WindowError::WindowGone));
        harness.ui.run();
    }

    #[test]
    fn test_dump_lists_clock_and_windows() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        harness.add(window.setup);
        harness.time.advance(NANOS_PER_MS);

        let dump = harness.ui.dump();
        assert!(dump.starts_with("UiThread: 1 windows"));
        assert!(dump.contains("'test'"));
    }
}
