//! Drawing
//!
//! A draw goes to the hardware renderer when it is enabled and requested,
//! otherwise to the software surface. Draws that must be reported to the
//! compositor wait for every registered draw callback to acknowledge before
//! `finish_drawing` is sent.

use std::time::Duration;

use cadence_frame::FrameInfoFlags;
use cadence_platform::{DisplayState, PlatformError, Rect, SurfaceHandle};

use crate::latch::DrawLatch;
use crate::view_root::ViewRoot;

/// Why a software draw did not reach the screen
enum SoftwareFailure {
    Lock(PlatformError),
    Post(PlatformError),
}

impl ViewRoot {
    pub(crate) fn perform_draw(&mut self) {
        if self.display.state == DisplayState::Off && !self.traversal.report_next_draw {
            tracing::trace!(window = ?self.id, "display is off, skipping draw");
            return;
        }

        let full_redraw = std::mem::take(&mut self.traversal.full_redraw_needed);
        self.clock.mark_draw_start();

        let reporting = self.traversal.report_next_draw;
        let latch = (reporting && !self.draw_callbacks.is_empty()).then(|| DrawLatch::new(self.draw_callbacks.len()));

        self.draw(full_redraw);

        if let Some(latch) = &latch {
            for callback in &self.draw_callbacks {
                callback.on_post_draw(latch.ack());
            }
        }

        if reporting {
            self.traversal.report_next_draw = false;
            if let Some(latch) = latch {
                let timeout = Duration::from_millis(self.config.draw_ack_timeout_ms);
                if !latch.wait(timeout) {
                    tracing::warn!(
                        window = ?self.id,
                        remaining = latch.remaining(),
                        timeout_ms = self.config.draw_ack_timeout_ms,
                        "timed out waiting for draw callbacks"
                    );
                }
            }
            self.session.finish_drawing(self.token);
        }
    }

    fn draw(&mut self, full_redraw: bool) {
        let Some(surface) = self.surface.handle() else {
            return;
        };

        let scroll_y = self.traversal.scroll_y;
        let mut full_redraw = full_redraw;
        if self.input_state.cur_scroll_y != scroll_y {
            self.input_state.cur_scroll_y = scroll_y;
            full_redraw = true;
        }

        let scale = self.params.compatibility_scale.unwrap_or(1.0);
        if full_redraw {
            let width = (self.traversal.width.max(0) as f32 * scale + 0.5) as i32;
            let height = (self.traversal.height.max(0) as f32 * scale + 0.5) as i32;
            self.traversal.dirty = Rect::from_size(width, height);
        }
        if self.traversal.dirty.is_empty() {
            return;
        }
        self.traversal.stats.draws += 1;

        let renderer_state = self.renderer.as_ref().map(|r| (r.is_enabled(), r.is_requested()));
        match renderer_state {
            Some((true, true)) => {
                self.traversal.dirty.set_empty();
                let result = match self.renderer.as_mut() {
                    Some(renderer) => renderer.draw(self.host.as_mut()),
                    None => Ok(()),
                };
                if let Err(e) = result {
                    if e.is_out_of_resources() {
                        self.handle_out_of_resources(&e);
                    } else {
                        tracing::warn!(window = ?self.id, error = %e, "hardware draw failed");
                    }
                }
            }
            Some((false, true)) => {
                let initialized = match self.renderer.as_mut() {
                    Some(renderer) => renderer.initialize(&surface),
                    None => Ok(false),
                };
                match initialized {
                    Ok(true) => {
                        self.traversal.renderer_size = None;
                        self.setup_renderer_if_needed();
                        self.traversal.full_redraw_needed = true;
                        self.schedule_traversal();
                    }
                    Ok(false) => self.draw_software(&surface, scale),
                    Err(e) if e.is_out_of_resources() => self.handle_out_of_resources(&e),
                    Err(e) => {
                        tracing::warn!(window = ?self.id, error = %e, "renderer initialization failed, drawing in software");
                        self.draw_software(&surface, scale);
                    }
                }
            }
            _ => self.draw_software(&surface, scale),
        }
    }

    fn draw_software(&mut self, surface: &SurfaceHandle, scale: f32) {
        let Some(software) = self.software.as_mut() else {
            tracing::trace!(window = ?self.id, "no software surface");
            return;
        };
        self.clock.add_frame_info_flags(FrameInfoFlags::SURFACE_CANVAS);

        let scroll_y = self.traversal.scroll_y;
        let mut dirty = self.traversal.dirty;
        let result = match software.lock_canvas(surface, &mut dirty) {
            Ok(canvas) => {
                canvas.clip_rect(dirty);
                canvas.translate(0.0, -(scroll_y as f32));
                if scale != 1.0 {
                    canvas.scale(scale, scale);
                }
                self.host.draw(canvas);
                software.unlock_canvas_and_post().map_err(SoftwareFailure::Post)
            }
            Err(e) => Err(SoftwareFailure::Lock(e)),
        };

        match result {
            Ok(()) => self.traversal.dirty.set_empty(),
            Err(SoftwareFailure::Lock(e)) if e.is_out_of_resources() => self.handle_out_of_resources(&e),
            Err(SoftwareFailure::Lock(e)) | Err(SoftwareFailure::Post(e)) => {
                tracing::error!(window = ?self.id, error = %e, "could not draw into the surface, asking for a new one");
                // picked up by the next traversal
                self.traversal.layout_requested = true;
                self.traversal.force_next_window_relayout = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use cadence_platform::{DisplayMetrics, WindowEvent};

    use super::*;
    use crate::testing::{FakeRenderer, Harness, TestWindow, ThreadedAck};

    #[test]
    fn test_reported_draw_waits_for_callbacks() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let ack = Arc::new(ThreadedAck::default());
        let id = harness.add(window.setup.with_draw_callback(ack.clone()));

        harness.frames(2);

        assert_eq!(ack.calls.load(Ordering::SeqCst), 1);
        assert_eq!(window.session.finished_draws(), 1);

        // unreported draws do not involve the callbacks
        harness.ui.window_mut(id).unwrap().invalidate();
        harness.frame();
        assert_eq!(ack.calls.load(Ordering::SeqCst), 1);
        assert_eq!(window.session.finished_draws(), 1);
        assert_eq!(window.host.lock().draws, 2);
    }

    #[test]
    fn test_display_off_suppresses_draws_until_it_returns() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);
        let draws = harness.ui.window(id).unwrap().stats().draws;

        let off = DisplayMetrics { state: DisplayState::Off, ..DisplayMetrics::default() };
        let root = harness.ui.window_mut(id).unwrap();
        root.handle_window_event(WindowEvent::DisplayChanged(off));
        root.invalidate();
        harness.frame();
        assert_eq!(harness.ui.window(id).unwrap().stats().draws, draws);

        harness.ui.window_mut(id).unwrap().handle_window_event(WindowEvent::DisplayChanged(DisplayMetrics::default()));
        harness.frame();
        assert_eq!(harness.ui.window(id).unwrap().stats().draws, draws + 1);
    }

    #[test]
    fn test_software_draw_clips_to_dirty_region() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);
        assert_eq!(window.software.lock().clips, vec![Rect::from_size(1080, 1920)]);

        harness.ui.window_mut(id).unwrap().invalidate_rect(Rect::new(10, 10, 50, 50));
        harness.frame();

        let log = window.software.lock();
        assert_eq!(log.clips.last(), Some(&Rect::new(10, 10, 50, 50)));
        assert_eq!(log.posts, 2);
    }

    #[test]
    fn test_lock_failure_asks_for_a_new_surface() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        window.software.lock().lock_errors.push_back(PlatformError::SurfaceLock("busy".into()));
        let id = harness.add(window.setup);
        harness.frames(2);

        assert_eq!(window.host.lock().draws, 0);
        assert!(harness.ui.window(id).unwrap().is_layout_requested());
        assert!(!harness.ui.window(id).unwrap().is_traversal_scheduled());

        harness.ui.window_mut(id).unwrap().invalidate();
        harness.frame();
        assert_eq!(window.session.relayout_count(), 2);
        assert_eq!(window.host.lock().draws, 1);
    }

    #[test]
    fn test_scroll_forces_full_redraw() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);

        harness.ui.window_mut(id).unwrap().set_scroll_y(120);
        harness.frame();

        assert_eq!(harness.ui.window(id).unwrap().input_state().cur_scroll_y, 120);
        assert_eq!(window.software.lock().clips.last(), Some(&Rect::from_size(1080, 1920)));
    }

    #[test]
    fn test_enabled_renderer_draws_instead_of_software() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let (renderer, renderer_log) = FakeRenderer::new();
        harness.add(window.setup.with_renderer(renderer));

        harness.frames(2);

        assert_eq!(renderer_log.lock().draws, 1);
        assert_eq!(window.host.lock().draws, 1);
        assert_eq!(window.software.lock().locks, 0);
        assert_eq!(window.session.finished_draws(), 1);
    }
}
