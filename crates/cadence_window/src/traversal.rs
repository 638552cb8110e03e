//! Traversal state machine
//!
//! One traversal per scheduled frame, in order:
//!
//! 1. resolve visibility, compatibility scale and the sizing source
//! 2. measure the host (wrap-content windows try a narrower width first)
//! 3. relayout with the compositor when anything it decides may have changed
//! 4. rebind the surface and measure again if the authoritative size differs
//! 5. lay out, with at most one extra synchronous pass for layout requests
//!    made during layout; later requests move to the next frame
//! 6. insets, initial focus and focus notifications
//! 7. draw, unless the window is hidden or just got a new surface

use cadence_frame::{BarrierToken, FrameInfoFlags};
use cadence_input::apply_touch_mode_locally;
use cadence_platform::{
    Dimension, Insets, LayoutPass, MeasureSpec, MeasuredSize, NodeId, PlatformError, Rect, RelayoutFlags,
    RelayoutRequest, RelayoutResult, ResizeReport, SurfaceHandle, Visibility, WindowInsets,
};

use crate::messages::WindowMessage;
use crate::view_root::ViewRoot;

/// Where a window is in its life
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowLifecycle {
    /// Not yet added to the display
    Initial,
    /// Added; the first traversal has not run
    FirstTraversal,
    Steady,
    /// Layout is suppressed unless a draw must be reported
    Stopped,
    Removed,
}

/// Traversal counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub traversals: u64,
    pub measures: u64,
    /// Layout passes, including second passes
    pub layouts: u64,
    pub relayouts: u64,
    pub draws: u64,
    /// Layout requests moved to a later frame
    pub deferred_layout_requests: u64,
}

/// Insets reported by the compositor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReportedInsets {
    pub overscan: Insets,
    pub content: Insets,
    pub visible: Insets,
    pub stable: Insets,
    pub outsets: Insets,
    pub always_consume_nav_bar: bool,
}

impl ReportedInsets {
    pub fn from_relayout(result: &RelayoutResult) -> Self {
        Self {
            overscan: result.overscan_insets,
            content: result.content_insets,
            visible: result.visible_insets,
            stable: result.stable_insets,
            outsets: result.outsets,
            always_consume_nav_bar: result.flags.contains(RelayoutFlags::CONSUME_ALWAYS_NAV_BAR),
        }
    }

    pub fn from_report(report: &ResizeReport) -> Self {
        Self {
            overscan: report.overscan_insets,
            content: report.content_insets,
            visible: report.visible_insets,
            stable: report.stable_insets,
            outsets: report.outsets,
            always_consume_nav_bar: report.always_consume_nav_bar,
        }
    }

    /// Whether anything dispatched to the host differs; visible insets are not dispatched
    pub fn differs_for_host(&self, other: &ReportedInsets) -> bool {
        self.overscan != other.overscan
            || self.content != other.content
            || self.stable != other.stable
            || self.outsets != other.outsets
            || self.always_consume_nav_bar != other.always_consume_nav_bar
    }

    pub fn window_insets(&self) -> WindowInsets {
        WindowInsets {
            overscan: self.overscan,
            content: self.content,
            stable: self.stable,
            outsets: self.outsets,
            always_consume_nav_bar: self.always_consume_nav_bar,
        }
    }
}

/// Per-window traversal state, touched only on the owner thread
#[derive(Debug)]
pub(crate) struct TraversalState {
    pub added: bool,
    pub removed: bool,
    pub first: bool,
    pub traversal_scheduled: bool,
    pub traversal_barrier: Option<BarrierToken>,
    pub in_traversal: bool,
    pub will_draw_soon: bool,
    pub layout_requested: bool,
    /// Layout params must be sent with the next relayout
    pub params_changed: bool,
    pub force_next_window_relayout: bool,
    pub new_surface_needed: bool,
    pub full_redraw_needed: bool,
    pub report_next_draw: bool,
    pub apply_insets_requested: bool,
    /// Window focus was gained since the last traversal
    pub pending_focus_event: bool,
    pub drag_resizing: bool,
    pub app_visible: bool,
    /// Visibility used by the last traversal
    pub view_visibility: Visibility,
    pub added_touch_mode: bool,
    /// Size decided by the last relayout, -1 before the first
    pub width: i32,
    pub height: i32,
    pub win_frame: Rect,
    /// Insets from resize notifications, not yet confirmed by a relayout
    pub pending_insets: ReportedInsets,
    /// Insets confirmed by the last relayout
    pub attach_insets: ReportedInsets,
    pub last_dispatched_insets: Option<WindowInsets>,
    pub dirty: Rect,
    pub scroll_y: i32,
    pub system_ui_seq: u32,
    pub global_system_ui_visibility: u32,
    /// Size the renderer was last set up for
    pub renderer_size: Option<(i32, i32)>,
    pub deferred_layout_requests: Vec<NodeId>,
    pub stats: TraversalStats,
}

impl Default for TraversalState {
    fn default() -> Self {
        Self {
            added: false,
            removed: false,
            first: true,
            traversal_scheduled: false,
            traversal_barrier: None,
            in_traversal: false,
            will_draw_soon: false,
            layout_requested: false,
            params_changed: false,
            force_next_window_relayout: false,
            new_surface_needed: false,
            full_redraw_needed: false,
            report_next_draw: false,
            apply_insets_requested: false,
            pending_focus_event: false,
            drag_resizing: false,
            app_visible: true,
            view_visibility: Visibility::Gone,
            added_touch_mode: false,
            width: -1,
            height: -1,
            win_frame: Rect::default(),
            pending_insets: ReportedInsets::default(),
            attach_insets: ReportedInsets::default(),
            last_dispatched_insets: None,
            dirty: Rect::default(),
            scroll_y: 0,
            system_ui_seq: 0,
            global_system_ui_visibility: 0,
            renderer_size: None,
            deferred_layout_requests: Vec::new(),
            stats: TraversalStats::default(),
        }
    }
}

impl ViewRoot {
    pub(crate) fn perform_traversals(&mut self) {
        if !self.traversal.added || self.traversal.removed {
            return;
        }
        self.traversal.stats.traversals += 1;
        self.traversal.in_traversal = true;
        self.traversal.will_draw_soon = true;

        // ---------------------------------------------------------------- 1
        let host_visibility = self.host_visibility();
        let visible = host_visibility == Visibility::Visible;
        let visibility_changed = self.traversal.view_visibility != host_visibility || self.traversal.new_surface_needed;

        let mut params_to_send = self.traversal.params_changed.then(|| self.params.clone());
        self.traversal.params_changed = false;
        let inverted_scale = self.params.compatibility_scale.filter(|scale| *scale > 0.0).map(|scale| 1.0 / scale);
        if inverted_scale != self.input_state.compat_inverted_scale {
            self.input_state.compat_inverted_scale = inverted_scale;
            params_to_send.get_or_insert_with(|| self.params.clone());
        }

        let mut window_size_may_change = false;
        let (mut desired_width, mut desired_height) = if self.traversal.first {
            self.traversal.full_redraw_needed = true;
            self.traversal.layout_requested = true;
            self.traversal.apply_insets_requested = true;
            self.host.dispatch_attached();
            self.host.dispatch_window_visibility_changed(host_visibility);
            self.display_size()
        } else {
            let frame = self.traversal.win_frame;
            if frame.width() != self.traversal.width || frame.height() != self.traversal.height {
                tracing::debug!(window = ?self.id, width = frame.width(), height = frame.height(), "window frame changed size");
                self.traversal.full_redraw_needed = true;
                self.traversal.layout_requested = true;
                window_size_may_change = true;
            }
            if visibility_changed {
                self.host.dispatch_window_visibility_changed(host_visibility);
            }
            (frame.width(), frame.height())
        };

        // ---------------------------------------------------------------- 2
        let mut insets_changed = false;
        let layout_requested =
            self.traversal.layout_requested && (!self.input_state.stopped || self.traversal.report_next_draw);
        if layout_requested {
            if self.traversal.first {
                let touch_mode = self.traversal.added_touch_mode;
                apply_touch_mode_locally(&mut self.input_state, self.host.as_mut(), touch_mode);
            } else {
                insets_changed = self.traversal.pending_insets.differs_for_host(&self.traversal.attach_insets);
                self.traversal.attach_insets.visible = self.traversal.pending_insets.visible;
                if self.params.width == Dimension::WrapContent || self.params.height == Dimension::WrapContent {
                    window_size_may_change = true;
                    (desired_width, desired_height) = self.display_size();
                }
            }
            window_size_may_change |= self.measure_hierarchy(desired_width, desired_height);
        }

        if self.traversal.apply_insets_requested {
            self.traversal.apply_insets_requested = false;
            self.dispatch_apply_insets();
            if layout_requested {
                // insets can change what the host wants
                window_size_may_change |= self.measure_hierarchy(desired_width, desired_height);
            }
        }

        if layout_requested {
            self.traversal.layout_requested = false;
        }

        let measured = self.host.measured_size();
        let frame = self.traversal.win_frame;
        let window_should_resize = layout_requested
            && window_size_may_change
            && (self.traversal.width != measured.width
                || self.traversal.height != measured.height
                || (self.params.width == Dimension::WrapContent
                    && frame.width() < desired_width
                    && frame.width() != self.traversal.width)
                || (self.params.height == Dimension::WrapContent
                    && frame.height() < desired_height
                    && frame.height() != self.traversal.height));

        // ---------------------------------------------------------------- 3, 4
        let mut layout_after_relayout = false;
        let mut new_surface = false;
        let force_relayout = self.traversal.force_next_window_relayout;
        if self.traversal.first
            || window_should_resize
            || insets_changed
            || visibility_changed
            || params_to_send.is_some()
            || force_relayout
        {
            self.traversal.force_next_window_relayout = false;
            let previous_surface = self.surface.handle();

            if let Some(renderer) = self.renderer.as_mut() {
                // the compositor may destroy the surface during relayout
                if renderer.pause_surface() {
                    self.traversal.dirty = Rect::from_size(self.traversal.width.max(0), self.traversal.height.max(0));
                }
                self.clock.add_frame_info_flags(FrameInfoFlags::WINDOW_LAYOUT_CHANGED);
            }

            let mut relayout_touch_mode = None;
            let mut content_insets_changed = false;
            match self.relayout_window(params_to_send.as_ref(), host_visibility, false) {
                Ok(result) => {
                    let reported = ReportedInsets::from_relayout(&result);
                    let cached = self.traversal.attach_insets;
                    content_insets_changed = reported.content != cached.content;
                    self.traversal.attach_insets = reported;
                    self.traversal.pending_insets = reported;
                    if reported.differs_for_host(&cached) {
                        tracing::debug!(window = ?self.id, content = ?reported.content, "relayout changed insets");
                        self.dispatch_apply_insets();
                    }

                    if result.flags.contains(RelayoutFlags::FIRST_TIME) {
                        self.traversal.report_next_draw = true;
                    }
                    let drag_resizing = result
                        .flags
                        .intersects(RelayoutFlags::DRAG_RESIZING_DOCKED | RelayoutFlags::DRAG_RESIZING_FREEFORM);
                    if drag_resizing != self.traversal.drag_resizing {
                        tracing::debug!(window = ?self.id, drag_resizing, "drag resizing changed");
                        self.traversal.drag_resizing = drag_resizing;
                        self.traversal.full_redraw_needed = true;
                    }

                    self.surface.set(result.surface, result.frame, result.backdrop_frame);
                    new_surface = previous_surface.is_none() && result.surface.is_some();
                    if let Err(e) = self.bind_renderer(previous_surface, &result, force_relayout) {
                        if e.is_out_of_resources() {
                            // forget the surface so the retry binds it again
                            self.surface.release();
                            self.traversal.params_changed |= params_to_send.is_some();
                            self.handle_out_of_resources(&e);
                            self.traversal.in_traversal = false;
                            self.traversal.will_draw_soon = false;
                            return;
                        }
                        tracing::warn!(window = ?self.id, error = %e, "renderer could not bind the surface");
                    }

                    self.traversal.win_frame = result.frame;
                    relayout_touch_mode = Some(result.flags.contains(RelayoutFlags::IN_TOUCH_MODE));
                }
                Err(e) => {
                    tracing::warn!(window = ?self.id, error = %e, "relayout failed, keeping the previous geometry");
                    // the compositor never saw the params; send them with the next relayout
                    self.traversal.params_changed |= params_to_send.is_some();
                }
            }

            let frame = self.traversal.win_frame;
            if self.traversal.width != frame.width() || self.traversal.height != frame.height() {
                self.traversal.width = frame.width();
                self.traversal.height = frame.height();
            }
            self.setup_renderer_if_needed();

            if !self.input_state.stopped || self.traversal.report_next_draw {
                let focus_changed_by_touch_mode = relayout_touch_mode
                    .map(|touch| apply_touch_mode_locally(&mut self.input_state, self.host.as_mut(), touch))
                    .unwrap_or(false);
                let measured = self.host.measured_size();
                if focus_changed_by_touch_mode
                    || self.traversal.width != measured.width
                    || self.traversal.height != measured.height
                    || content_insets_changed
                {
                    if measured.width != self.traversal.width || measured.height != self.traversal.height {
                        tracing::debug!(
                            window = ?self.id,
                            measured_width = measured.width,
                            measured_height = measured.height,
                            width = self.traversal.width,
                            height = self.traversal.height,
                            "window did not get its measured size, measuring again"
                        );
                    }
                    self.measure_after_relayout();
                    layout_after_relayout = true;
                }
            }
        }

        // ---------------------------------------------------------------- 5
        let did_layout =
            (layout_requested || layout_after_relayout) && (!self.input_state.stopped || self.traversal.report_next_draw);
        if did_layout {
            self.perform_layout(desired_width, desired_height);
        }

        // ---------------------------------------------------------------- 6
        if self.traversal.first && !self.host.has_focus() {
            self.host.request_initial_focus();
        }
        if std::mem::take(&mut self.traversal.pending_focus_event) && self.input_state.has_window_focus {
            self.host.dispatch_window_state_changed();
        }

        self.traversal.first = false;
        self.traversal.will_draw_soon = false;
        self.traversal.new_surface_needed = false;
        self.traversal.view_visibility = host_visibility;

        // ---------------------------------------------------------------- 7
        if visible && !new_surface {
            self.perform_draw();
        } else if visible {
            // draw into the new surface with the next frame
            self.schedule_traversal();
        } else if self.traversal.report_next_draw {
            self.traversal.report_next_draw = false;
            self.session.finish_drawing(self.token);
        }

        self.traversal.in_traversal = false;
        if !self.traversal.deferred_layout_requests.is_empty() {
            self.post_to_self(WindowMessage::RunQueue);
        }
    }

    fn display_size(&self) -> (i32, i32) {
        if self.params.use_display_size {
            (self.display.real_width, self.display.real_height)
        } else {
            (self.display.app_width, self.display.app_height)
        }
    }

    fn perform_measure(&mut self, width: MeasureSpec, height: MeasureSpec) -> MeasuredSize {
        self.traversal.stats.measures += 1;
        self.host.measure(width, height)
    }

    /// Measure the host for the desired window size; true if the window may need to resize
    fn measure_hierarchy(&mut self, desired_width: i32, desired_height: i32) -> bool {
        let height_spec = MeasureSpec::root(desired_height, self.params.height);
        let mut good_measure = false;
        if self.params.width == Dimension::WrapContent {
            let preferred = self.config.preferred_dialog_width.filter(|&base| base > 0 && desired_width > base);
            if let Some(base) = preferred {
                let measured = self.perform_measure(MeasureSpec::root(base, self.params.width), height_spec);
                if measured.too_small {
                    let base = (base + desired_width) / 2;
                    let measured = self.perform_measure(MeasureSpec::root(base, self.params.width), height_spec);
                    good_measure = !measured.too_small;
                } else {
                    good_measure = true;
                }
                tracing::trace!(window = ?self.id, base, good_measure, "measured at the preferred dialog width");
            }
        }

        if good_measure {
            return false;
        }
        let measured = self.perform_measure(MeasureSpec::root(desired_width, self.params.width), height_spec);
        self.traversal.width != measured.width || self.traversal.height != measured.height
    }

    /// Measure against the size the compositor granted, spreading extra space by weight
    fn measure_after_relayout(&mut self) {
        let (width, height) = (self.traversal.width, self.traversal.height);
        let measured = self.perform_measure(
            MeasureSpec::root(width, self.params.width),
            MeasureSpec::root(height, self.params.height),
        );

        let (mut target_width, mut target_height) = (measured.width, measured.height);
        let mut measure_again = false;
        if self.params.horizontal_weight > 0.0 {
            target_width += ((width - target_width) as f32 * self.params.horizontal_weight) as i32;
            measure_again = true;
        }
        if self.params.vertical_weight > 0.0 {
            target_height += ((height - target_height) as f32 * self.params.vertical_weight) as i32;
            measure_again = true;
        }
        if measure_again {
            self.perform_measure(MeasureSpec::exactly(target_width), MeasureSpec::exactly(target_height));
        }
    }

    fn perform_layout(&mut self, desired_width: i32, desired_height: i32) {
        self.traversal.layout_requested = false;
        self.traversal.stats.layouts += 1;
        let measured = self.host.measured_size();
        let mut pass = LayoutPass::first();
        self.host.layout(Rect::from_size(measured.width, measured.height), &mut pass);

        let requesters = pass.take_requests();
        if requesters.is_empty() {
            return;
        }
        let valid = self.valid_layout_requesters(&requesters, false);
        if valid.is_empty() {
            return;
        }
        for &node in &valid {
            tracing::warn!(window = ?self.id, node = node.0, "layout requested during layout, running a second pass");
            self.host.request_layout(node);
        }
        self.measure_hierarchy(desired_width, desired_height);
        let measured = self.host.measured_size();
        let mut second = LayoutPass::second();
        self.traversal.stats.layouts += 1;
        self.host.layout(Rect::from_size(measured.width, measured.height), &mut second);

        let late = self.valid_layout_requesters(&second.take_requests(), true);
        for &node in &late {
            tracing::warn!(window = ?self.id, node = node.0, "layout requested during the second pass, deferred to the next frame");
        }
        self.traversal.stats.deferred_layout_requests += late.len() as u64;
        self.traversal.deferred_layout_requests.extend(late);
    }

    /// Requesters still attached and visible; the first check also clears their forced layout
    fn valid_layout_requesters(&mut self, requesters: &[NodeId], second_pass: bool) -> Vec<NodeId> {
        let valid = requesters
            .iter()
            .copied()
            .filter(|&node| {
                self.host.is_attached(node)
                    && (second_pass || self.host.is_force_layout(node))
                    && !self.host.has_gone_ancestor(node)
            })
            .collect();
        if !second_pass {
            for &node in requesters {
                self.host.clear_force_layout(node);
            }
        }
        valid
    }

    /// Re-issue layout requests deferred by the last traversal
    pub(crate) fn run_deferred_layout_requests(&mut self) {
        let nodes = std::mem::take(&mut self.traversal.deferred_layout_requests);
        if nodes.is_empty() {
            return;
        }
        for node in nodes {
            self.host.request_layout(node);
        }
        self.request_layout();
    }

    fn relayout_window(
        &mut self,
        params: Option<&cadence_platform::LayoutParams>,
        visibility: Visibility,
        insets_pending: bool,
    ) -> Result<RelayoutResult, PlatformError> {
        let measured = self.host.measured_size();
        let scale = self.params.compatibility_scale.unwrap_or(1.0);
        let request = RelayoutRequest {
            params,
            requested_width: (measured.width as f32 * scale + 0.5) as i32,
            requested_height: (measured.height as f32 * scale + 0.5) as i32,
            visibility,
            insets_pending,
        };
        self.traversal.stats.relayouts += 1;
        tracing::trace!(
            window = ?self.id,
            width = request.requested_width,
            height = request.requested_height,
            ?visibility,
            "relayout"
        );
        self.session.relayout(self.token, &request)
    }

    /// Bring the renderer in line with the surface the relayout returned
    fn bind_renderer(
        &mut self,
        previous: Option<SurfaceHandle>,
        result: &RelayoutResult,
        forced: bool,
    ) -> Result<(), PlatformError> {
        match (previous, result.surface) {
            (None, Some(handle)) => {
                self.traversal.full_redraw_needed = true;
                if let Some(renderer) = self.renderer.as_mut().filter(|r| r.is_requested()) {
                    if renderer.initialize(&handle)? {
                        self.traversal.renderer_size = None;
                    }
                }
            }
            (Some(_), None) => {
                if let Some(renderer) = self.renderer.as_mut().filter(|r| r.is_enabled()) {
                    renderer.destroy();
                }
                self.traversal.renderer_size = None;
            }
            (Some(old), Some(handle)) => {
                let replaced = old != handle
                    || forced
                    || result.flags.intersects(RelayoutFlags::SURFACE_CHANGED | RelayoutFlags::SURFACE_RESIZED);
                if replaced {
                    self.traversal.full_redraw_needed = true;
                    if let Some(renderer) = self.renderer.as_mut().filter(|r| r.is_enabled()) {
                        renderer.update_surface(&handle)?;
                    }
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    pub(crate) fn setup_renderer_if_needed(&mut self) {
        let size = (self.traversal.width, self.traversal.height);
        if let Some(renderer) = self.renderer.as_mut() {
            if renderer.is_enabled() && self.traversal.renderer_size != Some(size) {
                renderer.setup(size.0, size.1, &self.params.surface_insets);
                self.traversal.renderer_size = Some(size);
            }
        }
    }

    fn dispatch_apply_insets(&mut self) {
        let insets = self.traversal.attach_insets.window_insets();
        self.traversal.last_dispatched_insets = Some(insets);
        self.host.dispatch_apply_insets(&insets);
    }

    /// Ask the compositor to free memory; terminate if it cannot and the process is not privileged
    pub(crate) fn handle_out_of_resources(&mut self, error: &PlatformError) {
        tracing::error!(window = ?self.id, error = %error, "out of resources binding the surface");
        if !self.session.out_of_memory(self.token) && !self.config.privileged_process {
            tracing::error!(window = ?self.id, "no memory was freed for the window, terminating");
            self.process.terminate();
        }
        self.traversal.layout_requested = true;
        self.traversal.force_next_window_relayout = true;
        self.schedule_traversal();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use cadence_platform::{LayoutParams, WindowEvent};

    use super::*;
    use crate::config::WindowConfig;
    use crate::testing::{FakeRenderer, Harness, RecordingProcess, TestHost, TestWindow};

    fn content_insets(top: i32) -> ResizeReport {
        ResizeReport {
            frame: Rect::from_size(1080, 1920),
            content_insets: Insets::new(0, top, 0, 0),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_traversal_sizes_from_display_and_relayouts() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        assert_eq!(harness.ui.window(id).unwrap().lifecycle(), WindowLifecycle::FirstTraversal);

        harness.frame();

        let root = harness.ui.window(id).unwrap();
        assert_eq!(root.size(), (1080, 1920));
        assert_eq!(root.lifecycle(), WindowLifecycle::Steady);
        assert_eq!(window.session.relayout_count(), 1);
        let call = window.session.relayouts.lock()[0].clone();
        assert_eq!((call.width, call.height), (1080, 1920));
        assert_eq!(call.visibility, Visibility::Visible);

        let log = window.host.lock();
        assert_eq!(log.attached, 1);
        assert_eq!(log.insets.len(), 1);
        assert_eq!(log.layouts, vec![Rect::from_size(1080, 1920)]);
        assert_eq!(log.initial_focus_requests, 1);
    }

    #[test]
    fn test_new_surface_defers_draw_to_next_frame() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);

        harness.frame();
        assert_eq!(window.host.lock().draws, 0);
        assert!(harness.ui.window(id).unwrap().is_traversal_scheduled());
        assert_eq!(window.session.finished_draws(), 0);

        harness.frame();
        assert_eq!(window.host.lock().draws, 1);
        assert_eq!(window.session.finished_draws(), 1);
        assert_eq!(window.session.relayout_count(), 1);
        assert!(!harness.ui.window(id).unwrap().is_traversal_scheduled());
    }

    #[test]
    fn test_repeated_requests_collapse_into_one_traversal() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);
        let before = harness.ui.window(id).unwrap().stats().traversals;

        let root = harness.ui.window_mut(id).unwrap();
        root.request_layout();
        root.invalidate();
        root.schedule_traversal();
        root.request_layout();
        harness.frame();
        harness.frame();

        assert_eq!(harness.ui.window(id).unwrap().stats().traversals, before + 1);
    }

    #[test]
    fn test_layout_request_during_layout_gets_one_extra_pass() {
        let mut harness = Harness::new();
        let (mut host, log) = TestHost::new();
        host.requester = Some((NodeId(7), 2));
        let window = TestWindow::with_host(host, log);
        let id = harness.add(window.setup);

        harness.frame();
        let stats = harness.ui.window(id).unwrap().stats();
        assert_eq!(stats.layouts, 2);
        assert_eq!(stats.deferred_layout_requests, 1);
        assert_eq!(window.host.lock().layout_requests, vec![NodeId(7)]);

        // the deferred request comes back after the next traversal
        harness.frame();
        assert_eq!(window.host.lock().layouts.len(), 2);
        assert_eq!(window.host.lock().layout_requests, vec![NodeId(7), NodeId(7)]);
        assert!(harness.ui.window(id).unwrap().is_traversal_scheduled());

        harness.frame();
        assert_eq!(window.host.lock().layouts.len(), 3);
        assert_eq!(harness.ui.window(id).unwrap().stats().deferred_layout_requests, 1);
    }

    #[test]
    fn test_content_insets_change_dispatches_and_measures_again() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);
        let measures = window.host.lock().measures.len();
        let insets = window.host.lock().insets.len();

        *window.session.content_insets.lock() = Insets::new(0, 50, 0, 0);
        harness.ui.window_mut(id).unwrap().handle_window_event(WindowEvent::Resized(content_insets(50)));
        harness.frame();

        let log = window.host.lock();
        assert_eq!(log.insets.len(), insets + 1);
        assert_eq!(log.insets.last().unwrap().content, Insets::new(0, 50, 0, 0));
        // once for the layout request, once against the granted size
        assert_eq!(log.measures.len(), measures + 2);
        assert_eq!(window.session.relayout_count(), 2);
        assert_eq!(harness.ui.window(id).unwrap().insets().content, Insets::new(0, 50, 0, 0));
    }

    #[test]
    fn test_unchanged_resize_report_is_ignored() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);

        harness.ui.window_mut(id).unwrap().handle_window_event(WindowEvent::Resized(content_insets(0)));
        assert!(!harness.ui.window(id).unwrap().is_traversal_scheduled());
    }

    #[test]
    fn test_wrap_content_tries_preferred_dialog_width() {
        let mut harness = Harness::with_config(WindowConfig::system());
        let (mut host, log) = TestHost::new();
        host.min_width = 500;
        let mut window = TestWindow::with_host(host, log);
        window.setup.params = LayoutParams::new("dialog").size(Dimension::WrapContent, Dimension::WrapContent);
        harness.add(window.setup);

        harness.frame();

        let widths: Vec<MeasureSpec> = window.host.lock().measures.iter().take(3).map(|(w, _)| *w).collect();
        assert_eq!(widths, vec![MeasureSpec::at_most(320), MeasureSpec::at_most(700), MeasureSpec::at_most(1080)]);
        let call = window.session.relayouts.lock()[0].clone();
        assert_eq!((call.width, call.height), (400, 300));
    }

    #[test]
    fn test_dialog_that_fits_preferred_width_stops_there() {
        let mut harness = Harness::with_config(WindowConfig::system());
        let mut window = TestWindow::new();
        window.setup.params = LayoutParams::new("dialog").size(Dimension::WrapContent, Dimension::WrapContent);
        harness.add(window.setup);

        harness.frame();

        assert_eq!(window.host.lock().measures[0].0, MeasureSpec::at_most(320));
        assert_eq!(window.session.relayouts.lock()[0].width, 320);
    }

    #[test]
    fn test_compatibility_scale_applies_to_relayout_and_input() {
        let mut harness = Harness::new();
        let mut window = TestWindow::new();
        window.setup.params = LayoutParams::new("compat").compatibility_scale(Some(0.5));
        let id = harness.add(window.setup);

        harness.frame();

        let call = window.session.relayouts.lock()[0].clone();
        assert_eq!((call.width, call.height), (540, 960));
        assert!(call.params_sent);
        assert_eq!(harness.ui.window(id).unwrap().input_state().compat_inverted_scale, Some(2.0));
    }

    #[test]
    fn test_stopped_window_skips_layout() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);
        let layouts = window.host.lock().layouts.len();

        let root = harness.ui.window_mut(id).unwrap();
        root.set_stopped(true);
        root.request_layout();
        assert_eq!(root.lifecycle(), WindowLifecycle::Stopped);
        harness.frame();
        assert_eq!(window.host.lock().layouts.len(), layouts);

        harness.ui.window_mut(id).unwrap().set_stopped(false);
        harness.frame();
        assert_eq!(window.host.lock().layouts.len(), layouts + 1);
    }

    #[test]
    fn test_hidden_app_relayouts_gone_and_does_not_draw() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);
        let draws = window.host.lock().draws;

        harness.ui.window_mut(id).unwrap().handle_window_event(WindowEvent::AppVisibilityChanged(false));
        harness.frame();

        let calls = window.session.relayouts.lock().clone();
        assert_eq!(calls.last().unwrap().visibility, Visibility::Gone);
        assert_eq!(window.host.lock().draws, draws);
    }

    #[test]
    fn test_focus_gain_notifies_state_change_after_traversal() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);

        harness
            .ui
            .window_mut(id)
            .unwrap()
            .handle_window_event(WindowEvent::FocusChanged { has_focus: true, in_touch_mode: false });
        assert_eq!(window.host.lock().focus_changes, vec![true]);
        assert_eq!(window.host.lock().state_changes, 0);

        harness.frame();
        assert_eq!(window.host.lock().state_changes, 1);
    }

    #[test]
    fn test_out_of_resources_terminates_unprivileged_process() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let process = Arc::new(RecordingProcess::default());
        let (renderer, renderer_log) = FakeRenderer::new();
        renderer_log.lock().initialize_results.push_back(Err(PlatformError::OutOfResources("no memory".into())));
        let setup = window.setup.with_renderer(renderer).with_process_control(process.clone());
        let id = harness.add(setup);

        harness.frame();

        assert_eq!(window.session.out_of_memory_calls.load(Ordering::SeqCst), 1);
        assert_eq!(process.terminations.load(Ordering::SeqCst), 1);
        assert!(!harness.ui.window(id).unwrap().surface().is_valid());
        assert!(harness.ui.window(id).unwrap().is_traversal_scheduled());
    }

    #[test]
    fn test_out_of_resources_in_privileged_process_retries() {
        let mut harness = Harness::with_config(WindowConfig::standard().with_privileged_process(true));
        let window = TestWindow::new();
        let process = Arc::new(RecordingProcess::default());
        let (renderer, renderer_log) = FakeRenderer::new();
        renderer_log.lock().initialize_results.push_back(Err(PlatformError::OutOfResources("no memory".into())));
        let setup = window.setup.with_renderer(renderer).with_process_control(process.clone());
        let id = harness.add(setup);

        harness.frame();
        assert_eq!(process.terminations.load(Ordering::SeqCst), 0);

        // the retry relayouts, binds the renderer and draws a frame later
        harness.frames(2);
        assert_eq!(process.terminations.load(Ordering::SeqCst), 0);
        assert_eq!(window.session.relayout_count(), 2);
        assert!(harness.ui.window(id).unwrap().surface().is_valid());
        let log = renderer_log.lock();
        assert_eq!(log.initializations, 2);
        assert_eq!(log.setups, vec![(1080, 1920)]);
        assert_eq!(log.draws, 1);
    }

    #[test]
    fn test_relayout_failure_keeps_geometry() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);

        window.session.relayout_errors.lock().push_back(PlatformError::Compositor("dead".into()));
        harness.ui.window_mut(id).unwrap().set_layout_params(LayoutParams::new("renamed"));
        harness.frame();

        let root = harness.ui.window(id).unwrap();
        assert_eq!(root.size(), (1080, 1920));
        assert_eq!(root.params().title, "renamed");
        assert_eq!(window.session.relayout_count(), 2);
    }

    #[test]
    fn test_params_survive_a_failed_relayout() {
        let mut harness = Harness::new();
        let window = TestWindow::new();
        let id = harness.add(window.setup);
        harness.frames(2);

        window.session.relayout_errors.lock().push_back(PlatformError::Compositor("dead".into()));
        harness.ui.window_mut(id).unwrap().set_layout_params(LayoutParams::new("renamed"));
        harness.frame();

        harness.ui.window_mut(id).unwrap().request_layout();
        harness.frame();

        let calls = window.session.relayouts.lock().clone();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].params_sent);
        assert!(calls[2].params_sent);
    }

    #[test]
    fn test_params_survive_out_of_resources_retry() {
        let mut harness = Harness::with_config(WindowConfig::standard().with_privileged_process(true));
        let window = TestWindow::new();
        let (renderer, renderer_log) = FakeRenderer::new();
        renderer_log.lock().initialize_results.push_back(Err(PlatformError::OutOfResources("no memory".into())));
        let id = harness.add(window.setup.with_renderer(renderer));
        harness.ui.window_mut(id).unwrap().set_layout_params(LayoutParams::new("renamed"));

        harness.frames(2);

        let calls = window.session.relayouts.lock().clone();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].params_sent);
        assert!(calls[1].params_sent);
    }

    #[test]
    fn test_reported_insets_differ_for_host() {
        let a = ReportedInsets::default();
        let mut b = a;
        b.visible = Insets::new(0, 0, 0, 100);
        assert!(!a.differs_for_host(&b));
        b.stable = Insets::new(0, 24, 0, 0);
        assert!(a.differs_for_host(&b));
        assert_eq!(b.window_insets().stable, Insets::new(0, 24, 0, 0));
    }
}
