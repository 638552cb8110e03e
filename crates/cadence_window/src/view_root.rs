//! Window root
//!
//! A [`ViewRoot`] connects one hosted view tree to the compositor session,
//! the drawing backends, the frame clock and the input pipeline. It lives on
//! the UI thread that created it and every mutating entry point checks that.
//!
//! Traversals are collapsed: any number of layout requests or invalidations
//! before the next frame schedule a single traversal. The traversal itself is
//! in [`crate::traversal`] and drawing in [`crate::draw`].

use std::fmt::Write as _;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use cadence_frame::{ActionTarget, CallbackPhase, FrameAction, FrameClock, MessageQueue};
use cadence_input::{
    apply_touch_mode_locally, BatchRequest, CompletionSink, InputBatcher, InputCollaborators, InputContext,
    InputEffects, InputPipeline, InputState, QueuedFlags, ReceiverRef, TimerRequest,
};
use cadence_platform::{
    DisplayMetrics, DisplayState, HostView, InputEvent, LayoutParams, PlatformError, Rect, Renderer, ResizeReport,
    SoftwareSurface, Visibility, WindowEvent, WindowSession, WindowToken,
};

use crate::config::WindowConfig;
use crate::error::{Result, WindowError};
use crate::latch::WindowDrawCallback;
use crate::messages::{UiMessage, WindowMessage, WHAT_CONSUME_BATCHED_INPUT, WHAT_TRAVERSAL};
use crate::process::{AbortProcess, ProcessControl};
use crate::proxy::WindowProxy;
use crate::surface::SharedSurface;
use crate::traversal::{ReportedInsets, TraversalState, TraversalStats, WindowLifecycle};
use crate::ui_thread::WindowId;

/// What a window is built from
pub struct WindowSetup {
    pub host: Box<dyn HostView>,
    pub session: Arc<dyn WindowSession>,
    pub params: LayoutParams,
    pub display: DisplayMetrics,
    pub renderer: Option<Box<dyn Renderer>>,
    pub software: Option<Box<dyn SoftwareSurface>>,
    pub process: Arc<dyn ProcessControl>,
    pub input: InputCollaborators,
    pub draw_callbacks: Vec<Arc<dyn WindowDrawCallback>>,
}

impl WindowSetup {
    /// A window with software drawing only and default input collaborators
    pub fn new(host: impl HostView + 'static, session: Arc<dyn WindowSession>, params: LayoutParams) -> Self {
        Self {
            host: Box::new(host),
            session,
            params,
            display: DisplayMetrics::default(),
            renderer: None,
            software: None,
            process: Arc::new(AbortProcess),
            input: InputCollaborators::default(),
            draw_callbacks: Vec::new(),
        }
    }

    pub fn with_display(mut self, display: DisplayMetrics) -> Self {
        self.display = display;
        self
    }

    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn with_software_surface(mut self, software: impl SoftwareSurface + 'static) -> Self {
        self.software = Some(Box::new(software));
        self
    }

    pub fn with_process_control(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = process;
        self
    }

    pub fn with_input(mut self, input: InputCollaborators) -> Self {
        self.input = input;
        self
    }

    pub fn with_draw_callback(mut self, callback: Arc<dyn WindowDrawCallback>) -> Self {
        self.draw_callbacks.push(callback);
        self
    }
}

/// The root of one window, owned by its UI thread
pub struct ViewRoot {
    pub(crate) id: WindowId,
    pub(crate) token: WindowToken,
    owner: ThreadId,
    pub(crate) config: WindowConfig,
    pub(crate) clock: Arc<FrameClock>,
    queue: MessageQueue<UiMessage>,
    proxy: WindowProxy,
    completions: Arc<dyn CompletionSink>,

    pub(crate) host: Box<dyn HostView>,
    pub(crate) session: Arc<dyn WindowSession>,
    pub(crate) renderer: Option<Box<dyn Renderer>>,
    pub(crate) software: Option<Box<dyn SoftwareSurface>>,
    pub(crate) process: Arc<dyn ProcessControl>,
    pub(crate) draw_callbacks: Vec<Arc<dyn WindowDrawCallback>>,

    pub(crate) params: LayoutParams,
    pub(crate) display: DisplayMetrics,
    pub(crate) surface: SharedSurface,
    pub(crate) traversal: TraversalState,

    pipeline: InputPipeline,
    batcher: InputBatcher,
    pub(crate) input_state: InputState,
    process_input_scheduled: bool,
    consume_batched_scheduled: bool,
}

impl ViewRoot {
    pub(crate) fn new(
        id: WindowId,
        setup: WindowSetup,
        config: &WindowConfig,
        clock: Arc<FrameClock>,
        queue: MessageQueue<UiMessage>,
    ) -> Self {
        let proxy = WindowProxy::new(id, queue.clone());
        let completions: Arc<dyn CompletionSink> = Arc::new(proxy.clone());
        let pipeline = InputPipeline::new(&config.input, setup.input);
        Self {
            id,
            token: WindowToken(id.to_raw()),
            owner: thread::current().id(),
            config: config.clone(),
            clock,
            queue,
            proxy,
            completions,
            host: setup.host,
            session: setup.session,
            renderer: setup.renderer,
            software: setup.software,
            process: setup.process,
            draw_callbacks: setup.draw_callbacks,
            params: setup.params,
            display: setup.display,
            surface: SharedSurface::new(),
            traversal: TraversalState::default(),
            pipeline,
            batcher: InputBatcher::new(),
            input_state: InputState::default(),
            process_input_scheduled: false,
            consume_batched_scheduled: false,
        }
    }

    /// Panics unless called on the thread that created the window
    pub(crate) fn check_thread(&self) {
        if thread::current().id() != self.owner {
            panic!(
                "window {:?} ('{}') was touched from a thread other than the one that created it",
                self.id, self.params.title
            );
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn proxy(&self) -> WindowProxy {
        self.proxy.clone()
    }

    pub fn lifecycle(&self) -> WindowLifecycle {
        let t = &self.traversal;
        if t.removed {
            WindowLifecycle::Removed
        } else if !t.added {
            WindowLifecycle::Initial
        } else if t.first {
            WindowLifecycle::FirstTraversal
        } else if self.input_state.stopped {
            WindowLifecycle::Stopped
        } else {
            WindowLifecycle::Steady
        }
    }

    pub fn is_removed(&self) -> bool {
        self.traversal.removed
    }

    pub fn stats(&self) -> TraversalStats {
        self.traversal.stats
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// Size decided by the last relayout
    pub fn size(&self) -> (i32, i32) {
        (self.traversal.width, self.traversal.height)
    }

    /// Frame last reported by the compositor
    pub fn window_frame(&self) -> Rect {
        self.traversal.win_frame
    }

    /// Insets last reported by the compositor
    pub fn insets(&self) -> ReportedInsets {
        self.traversal.attach_insets
    }

    pub fn surface(&self) -> SharedSurface {
        self.surface.clone()
    }

    pub fn input_state(&self) -> &InputState {
        &self.input_state
    }

    pub fn host(&self) -> &dyn HostView {
        &*self.host
    }

    pub fn is_traversal_scheduled(&self) -> bool {
        self.traversal.traversal_scheduled
    }

    pub fn is_layout_requested(&self) -> bool {
        self.traversal.layout_requested
    }

    pub fn pending_input_events(&self) -> usize {
        self.pipeline.pending_len() + self.batcher.len()
    }

    pub(crate) fn host_visibility(&self) -> Visibility {
        if self.traversal.app_visible {
            self.host.visibility()
        } else {
            Visibility::Gone
        }
    }

    // ========================================================================
    // Adding and removing
    // ========================================================================

    /// Add the window to the display and schedule its first traversal
    pub fn add(&mut self) -> Result<()> {
        self.check_thread();
        if self.traversal.added || self.traversal.removed {
            return Ok(());
        }
        // the first traversal runs ahead of anything posted after the add
        self.request_layout();

        let visibility = self.host_visibility();
        let result = match self.session.add_to_display(self.token, &self.params, visibility) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(window = ?self.id, title = %self.params.title, error = %e, "window add failed");
                self.unschedule_traversal();
                self.traversal.removed = true;
                return Err(match e {
                    PlatformError::AddRejected(reason) => WindowError::AddRejected(reason),
                    other => other.into(),
                });
            }
        };

        self.traversal.added = true;
        self.input_state.added = true;
        self.traversal.app_visible = result.app_visible;
        self.traversal.added_touch_mode = result.in_touch_mode;
        self.traversal.attach_insets = ReportedInsets {
            content: result.content_insets,
            stable: result.stable_insets,
            outsets: result.outsets,
            always_consume_nav_bar: result.always_consume_nav_bar,
            ..ReportedInsets::default()
        };
        self.traversal.pending_insets = self.traversal.attach_insets;
        tracing::debug!(window = ?self.id, title = %self.params.title, "window added");
        Ok(())
    }

    /// Detach the host, finish all input and remove the window from the display
    pub fn die(&mut self) {
        self.check_thread();
        if self.traversal.removed {
            return;
        }
        self.traversal.removed = true;
        self.unschedule_traversal();
        if self.consume_batched_scheduled {
            self.consume_batched_scheduled = false;
            let action = self.frame_action(WHAT_CONSUME_BATCHED_INPUT);
            self.clock.remove_callbacks(CallbackPhase::Input, Some(&action), None);
        }
        self.remove_messages(|_| true);

        for (_, receiver) in self.batcher.consume(None) {
            if let Some(receiver) = receiver {
                receiver.finish(false);
            }
        }
        self.pipeline.detach();

        if self.traversal.added {
            self.host.dispatch_detached();
        }
        if let Some(renderer) = self.renderer.as_mut() {
            if renderer.is_enabled() {
                renderer.destroy();
            }
        }
        self.surface.release();
        if self.traversal.added {
            self.session.remove(self.token);
            self.traversal.added = false;
            self.input_state.added = false;
        }
        tracing::debug!(window = ?self.id, title = %self.params.title, "window removed");
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    pub(crate) fn frame_action(&self, what: u32) -> FrameAction {
        FrameAction::Target(ActionTarget { target: self.id.to_raw(), what })
    }

    /// Schedule a traversal for the next frame; repeated calls collapse into one
    pub fn schedule_traversal(&mut self) {
        self.check_thread();
        if self.traversal.traversal_scheduled {
            return;
        }
        self.traversal.traversal_scheduled = true;
        self.traversal.traversal_barrier = Some(self.queue.post_sync_barrier());
        self.clock.post_callback(CallbackPhase::Traversal, self.frame_action(WHAT_TRAVERSAL), None);
        if !self.input_state.unbuffered_input_dispatch {
            self.schedule_consume_batched_input();
        }
        tracing::trace!(window = ?self.id, "traversal scheduled");
    }

    pub fn unschedule_traversal(&mut self) {
        self.check_thread();
        if !self.traversal.traversal_scheduled {
            return;
        }
        self.traversal.traversal_scheduled = false;
        self.remove_traversal_barrier();
        let action = self.frame_action(WHAT_TRAVERSAL);
        self.clock.remove_callbacks(CallbackPhase::Traversal, Some(&action), None);
    }

    fn remove_traversal_barrier(&mut self) {
        if let Some(token) = self.traversal.traversal_barrier.take() {
            if let Err(e) = self.queue.remove_sync_barrier(token) {
                tracing::warn!(window = ?self.id, error = %e, "traversal barrier already removed");
            }
        }
    }

    fn do_traversal(&mut self) {
        if !self.traversal.traversal_scheduled {
            return;
        }
        self.traversal.traversal_scheduled = false;
        self.remove_traversal_barrier();
        self.perform_traversals();
    }

    /// Run a frame action addressed to this window
    pub(crate) fn on_frame_action(&mut self, what: u32, frame_time_nanos: i64) {
        self.check_thread();
        match what {
            WHAT_TRAVERSAL => self.do_traversal(),
            WHAT_CONSUME_BATCHED_INPUT => {
                self.consume_batched_scheduled = false;
                self.do_consume_batched_input(Some(frame_time_nanos));
            }
            other => tracing::warn!(window = ?self.id, what = other, "unknown frame action"),
        }
    }

    /// Mark the tree for layout in the next traversal
    pub fn request_layout(&mut self) {
        self.check_thread();
        self.traversal.layout_requested = true;
        self.schedule_traversal();
    }

    /// Redraw the whole window
    pub fn invalidate(&mut self) {
        self.check_thread();
        let (width, height) = (self.traversal.width.max(0), self.traversal.height.max(0));
        self.invalidate_rect(Rect::from_size(width, height));
    }

    /// Redraw part of the window
    pub fn invalidate_rect(&mut self, rect: Rect) {
        self.check_thread();
        self.traversal.dirty.union(&rect);
        if !self.traversal.will_draw_soon {
            self.schedule_traversal();
        }
    }

    /// Dispatch insets to the host again in the next traversal
    pub fn request_apply_insets(&mut self) {
        self.check_thread();
        self.traversal.apply_insets_requested = true;
        self.schedule_traversal();
    }

    // ========================================================================
    // Window state setters
    // ========================================================================

    pub fn set_layout_params(&mut self, params: LayoutParams) {
        self.check_thread();
        self.params = params;
        self.traversal.params_changed = true;
        self.request_layout();
    }

    /// Stop or resume the window; stopped windows skip layout and drop input
    pub fn set_stopped(&mut self, stopped: bool) {
        self.check_thread();
        if self.input_state.stopped == stopped {
            return;
        }
        self.input_state.stopped = stopped;
        tracing::debug!(window = ?self.id, stopped, "window stopped state changed");
        if !stopped {
            self.schedule_traversal();
        }
    }

    pub fn set_ambient_mode(&mut self, ambient: bool) {
        self.check_thread();
        self.input_state.ambient_mode = ambient;
    }

    pub fn set_paused_for_transition(&mut self, paused: bool) {
        self.check_thread();
        self.input_state.paused_for_transition = paused;
    }

    pub fn set_input_method_target(&mut self, target: bool) {
        self.check_thread();
        self.input_state.ime_target = target && self.params.may_use_input_method;
    }

    pub fn set_local_focus_mode(&mut self, local: bool) {
        self.check_thread();
        self.input_state.local_focus_mode = local;
    }

    /// Scroll the content; applied at the next draw
    pub fn set_scroll_y(&mut self, scroll_y: i32) {
        self.check_thread();
        if self.traversal.scroll_y != scroll_y {
            self.traversal.scroll_y = scroll_y;
            self.invalidate();
        }
    }

    pub fn add_draw_callback(&mut self, callback: Arc<dyn WindowDrawCallback>) {
        self.check_thread();
        self.draw_callbacks.push(callback);
    }

    // ========================================================================
    // Messages
    // ========================================================================

    pub(crate) fn handle_message(&mut self, message: WindowMessage) {
        self.check_thread();
        match message {
            WindowMessage::Event(event) => self.handle_window_event(event),
            WindowMessage::Input { event, receiver } => self.dispatch_input_event(event, receiver),
            WindowMessage::InputStageFinished { token, handled } => {
                if let Err(e) = self.with_input(|pipeline, cx| pipeline.complete(token, handled, cx)) {
                    tracing::warn!(window = ?self.id, error = %e, "dropping async input completion");
                }
            }
            WindowMessage::ProcessInputEvents => self.process_input_events(),
            WindowMessage::ConsumeBatchedInputImmediately => self.consume_batched_input_immediately(),
            WindowMessage::SyntheticTimer(timer) => self.with_input(|pipeline, cx| pipeline.on_timer(timer, cx)),
            WindowMessage::RunQueue => self.run_deferred_layout_requests(),
            WindowMessage::Die => self.die(),
        }
    }

    pub(crate) fn post_to_self(&self, message: WindowMessage) {
        let asynchronous = message.is_asynchronous();
        let message = UiMessage::Window { id: self.id, message };
        let posted = if asynchronous { self.queue.post_async(message) } else { self.queue.post(message) };
        if !posted {
            tracing::debug!(window = ?self.id, "UI thread is quitting, message dropped");
        }
    }

    fn post_to_self_at(&self, when_nanos: i64, message: WindowMessage) {
        let asynchronous = message.is_asynchronous();
        if !self.queue.post_at(when_nanos, UiMessage::Window { id: self.id, message }, asynchronous) {
            tracing::debug!(window = ?self.id, "UI thread is quitting, timer dropped");
        }
    }

    /// Remove this window's queued messages matching `predicate`
    fn remove_messages(&self, mut predicate: impl FnMut(&WindowMessage) -> bool) -> usize {
        let id = self.id;
        self.queue.remove_where(|m| matches!(m, UiMessage::Window { id: target, message } if *target == id && predicate(message)))
    }

    // ========================================================================
    // Compositor notifications
    // ========================================================================

    pub fn handle_window_event(&mut self, event: WindowEvent) {
        self.check_thread();
        match event {
            WindowEvent::Resized(report) => self.handle_resized(report),
            WindowEvent::Moved { x, y } => self.handle_moved(x, y),
            WindowEvent::FocusChanged { has_focus, in_touch_mode } => {
                self.handle_window_focus_changed(has_focus, in_touch_mode)
            }
            WindowEvent::AppVisibilityChanged(visible) => {
                if self.traversal.app_visible != visible {
                    self.traversal.app_visible = visible;
                    self.schedule_traversal();
                }
            }
            WindowEvent::GetNewSurface => {
                self.traversal.new_surface_needed = true;
                self.traversal.full_redraw_needed = true;
                self.schedule_traversal();
            }
            WindowEvent::SystemUiVisibilityChanged { seq, global_visibility, local_value, local_changes } => {
                self.handle_system_ui_visibility(seq, global_visibility, local_value, local_changes)
            }
            WindowEvent::DisplayChanged(metrics) => self.handle_display_changed(metrics),
            WindowEvent::CloseRequested => self.die(),
        }
    }

    fn handle_resized(&mut self, report: ResizeReport) {
        if !self.traversal.added {
            return;
        }
        let insets = ReportedInsets::from_report(&report);
        let frame_changed = self.traversal.win_frame != report.frame;
        if !frame_changed
            && insets == self.traversal.pending_insets
            && !report.report_draw
            && !report.force_layout
            && !report.configuration_changed
        {
            return;
        }

        self.traversal.win_frame = report.frame;
        self.traversal.pending_insets = insets;
        self.surface.set_frame(report.frame);
        if report.report_draw {
            self.traversal.report_next_draw = true;
        }
        if report.force_layout {
            self.traversal.force_next_window_relayout = true;
        }
        if frame_changed || report.force_layout {
            self.host.force_layout();
        }
        tracing::debug!(window = ?self.id, frame = ?report.frame, report_draw = report.report_draw, "window resized");
        self.request_layout();
    }

    fn handle_moved(&mut self, x: i32, y: i32) {
        if !self.traversal.added {
            return;
        }
        let frame = &mut self.traversal.win_frame;
        if frame.left != x || frame.top != y {
            frame.offset_to(x, y);
            let frame = *frame;
            self.surface.set_frame(frame);
            self.host.dispatch_window_moved(x, y);
        }
    }

    fn handle_window_focus_changed(&mut self, has_focus: bool, in_touch_mode: bool) {
        if !self.traversal.added {
            return;
        }
        if has_focus {
            apply_touch_mode_locally(&mut self.input_state, self.host.as_mut(), in_touch_mode);
        }
        self.input_state.has_window_focus = has_focus;
        self.host.dispatch_window_focus_changed(has_focus);
        tracing::debug!(window = ?self.id, has_focus, "window focus changed");
        if has_focus {
            self.traversal.pending_focus_event = true;
            self.schedule_traversal();
        }
    }

    fn handle_system_ui_visibility(&mut self, seq: u32, global_visibility: u32, local_value: u32, local_changes: u32) {
        if seq != self.traversal.system_ui_seq {
            self.traversal.system_ui_seq = seq;
            self.traversal.params_changed = true;
            self.schedule_traversal();
        }
        if local_changes != 0 {
            let current = self.params.system_ui_visibility;
            self.params.system_ui_visibility = (current & !local_changes) | (local_value & local_changes);
        }
        if global_visibility != self.traversal.global_system_ui_visibility {
            self.traversal.global_system_ui_visibility = global_visibility;
            self.host.dispatch_system_ui_visibility_changed(global_visibility);
        }
    }

    fn handle_display_changed(&mut self, metrics: DisplayMetrics) {
        let old_state = self.display.state;
        self.display = metrics;
        if old_state != metrics.state {
            tracing::debug!(window = ?self.id, from = ?old_state, to = ?metrics.state, "display state changed");
            if old_state == DisplayState::Off {
                // draws were suppressed while the display was off
                self.traversal.full_redraw_needed = true;
                self.schedule_traversal();
            }
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Accept an event from the platform receiver
    ///
    /// Moves are batched per device and consumed with the next frame. Other
    /// events flush their device's batch first and run right away.
    pub fn dispatch_input_event(&mut self, event: InputEvent, receiver: Option<ReceiverRef>) {
        self.check_thread();
        if InputBatcher::should_batch(&event) {
            if let InputEvent::Motion(motion) = event {
                self.batcher.add(motion, receiver);
            }
            if self.input_state.unbuffered_input_dispatch {
                self.post_to_self(WindowMessage::ConsumeBatchedInputImmediately);
            } else {
                self.schedule_consume_batched_input();
            }
            return;
        }
        for (batched, batched_receiver) in self.batcher.take_device(event.device_id()) {
            self.pipeline.enqueue(batched, batched_receiver, QueuedFlags::empty());
        }
        self.enqueue_input_event(event, receiver, QueuedFlags::empty(), true);
    }

    /// Queue an event; without `process_immediately` the queue drains from a message
    pub fn enqueue_input_event(
        &mut self,
        event: InputEvent,
        receiver: Option<ReceiverRef>,
        flags: QueuedFlags,
        process_immediately: bool,
    ) {
        self.check_thread();
        self.pipeline.enqueue(event, receiver, flags);
        if process_immediately {
            self.process_input_events();
        } else {
            self.schedule_process_input_events();
        }
    }

    /// Hand an event no one consumed to the synthetic stage
    pub fn dispatch_unhandled_input_event(&mut self, event: InputEvent) {
        self.check_thread();
        self.pipeline.enqueue_unhandled(event);
        self.schedule_process_input_events();
    }

    fn schedule_process_input_events(&mut self) {
        if !self.process_input_scheduled {
            self.process_input_scheduled = true;
            self.post_to_self(WindowMessage::ProcessInputEvents);
        }
    }

    fn process_input_events(&mut self) {
        if self.process_input_scheduled {
            self.process_input_scheduled = false;
            self.remove_messages(|m| matches!(m, WindowMessage::ProcessInputEvents));
        }
        let report = self.with_input(|pipeline, cx| pipeline.process_pending(cx));
        if let Some((newest, oldest)) = report.motion_times {
            self.clock.update_input_event_time(newest, oldest);
        }
    }

    fn schedule_consume_batched_input(&mut self) {
        if !self.consume_batched_scheduled {
            self.consume_batched_scheduled = true;
            self.clock
                .post_callback(CallbackPhase::Input, self.frame_action(WHAT_CONSUME_BATCHED_INPUT), None);
        }
    }

    fn consume_batched_input_immediately(&mut self) {
        if self.consume_batched_scheduled {
            self.consume_batched_scheduled = false;
            let action = self.frame_action(WHAT_CONSUME_BATCHED_INPUT);
            self.clock.remove_callbacks(CallbackPhase::Input, Some(&action), None);
        }
        self.do_consume_batched_input(None);
    }

    fn do_consume_batched_input(&mut self, frame_time_nanos: Option<i64>) {
        let batch = self.batcher.consume(frame_time_nanos);
        if !batch.is_empty() {
            for (event, receiver) in batch {
                self.pipeline.enqueue(event, receiver, QueuedFlags::empty());
            }
            self.process_input_events();
        }
        if frame_time_nanos.is_some() && self.batcher.has_pending() {
            self.schedule_consume_batched_input();
        }
    }

    /// Run `f` against the pipeline, then carry out the effects the stages left
    fn with_input<R>(&mut self, f: impl FnOnce(&mut InputPipeline, &mut InputContext<'_>) -> R) -> R {
        let mut effects = InputEffects::default();
        let now_nanos = self.clock.now_nanos();
        let result = {
            let mut cx = InputContext {
                host: self.host.as_mut(),
                state: &mut self.input_state,
                effects: &mut effects,
                completions: &self.completions,
                now_nanos,
            };
            f(&mut self.pipeline, &mut cx)
        };
        self.apply_input_effects(effects);
        result
    }

    fn apply_input_effects(&mut self, effects: InputEffects) {
        let InputEffects { synthesized, timers, touch_mode, consume_batched } = effects;
        for event in synthesized {
            self.pipeline.enqueue(event, None, QueuedFlags::empty());
        }
        if let Some(in_touch_mode) = touch_mode {
            self.session.set_in_touch_mode(in_touch_mode);
        }
        for request in timers {
            match request {
                TimerRequest::Schedule { timer, at_nanos } => {
                    self.remove_messages(|m| matches!(m, WindowMessage::SyntheticTimer(t) if *t == timer));
                    self.post_to_self_at(at_nanos, WindowMessage::SyntheticTimer(timer));
                }
                TimerRequest::Cancel(timer) => {
                    self.remove_messages(|m| matches!(m, WindowMessage::SyntheticTimer(t) if *t == timer));
                }
            }
        }
        match consume_batched {
            Some(BatchRequest::Immediately) => self.post_to_self(WindowMessage::ConsumeBatchedInputImmediately),
            Some(BatchRequest::NextFrame) if self.batcher.has_pending() => self.schedule_consume_batched_input(),
            _ => {}
        }
        if self.pipeline.has_pending() {
            self.schedule_process_input_events();
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    pub fn dump(&self, prefix: &str) -> String {
        let t = &self.traversal;
        let mut out = String::new();
        let _ = writeln!(out, "{prefix}ViewRoot {:?} '{}':", self.id, self.params.title);
        let inner = format!("{prefix}  ");
        let _ = writeln!(
            out,
            "{inner}lifecycle={:?} size={}x{} frame={:?} visibility={:?}",
            self.lifecycle(),
            t.width,
            t.height,
            t.win_frame,
            t.view_visibility
        );
        let _ = writeln!(
            out,
            "{inner}traversal_scheduled={} layout_requested={} report_next_draw={} full_redraw_needed={} surface={:?}",
            t.traversal_scheduled,
            t.layout_requested,
            t.report_next_draw,
            t.full_redraw_needed,
            self.surface.handle()
        );
        let _ = writeln!(out, "{inner}{:?}", t.stats);
        let _ = writeln!(out, "{inner}batched input: {}", self.batcher.len());
        out.push_str(&self.pipeline.dump(&inner));
        out
    }
}

impl std::fmt::Debug for ViewRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRoot")
            .field("id", &self.id)
            .field("title", &self.params.title)
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}
