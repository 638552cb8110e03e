//! Fakes shared by the unit tests

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use cadence_frame::{ManualTimeSource, ManualVsync, TimeSource, NANOS_PER_MS};
use cadence_input::InputEventReceiver;
use cadence_platform::{
    AddResult, Canvas, HostView, Insets, KeyEvent, LayoutParams, LayoutPass, MeasureMode, MeasureSpec, MeasuredSize,
    MotionEvent, NodeId, PlatformError, Rect, RelayoutFlags, RelayoutRequest, RelayoutResult, Renderer,
    SoftwareSurface, SurfaceHandle, Visibility, WindowInsets, WindowSession, WindowToken,
};

use crate::config::WindowConfig;
use crate::latch::{DrawAck, WindowDrawCallback};
use crate::process::ProcessControl;
use crate::ui_thread::{UiThread, WindowId};
use crate::view_root::WindowSetup;

// ============================================================================
// Host
// ============================================================================

/// What the host was asked to do; shared with the test after the host moves into a window
#[derive(Debug, Default)]
pub struct HostLog {
    pub measures: Vec<(MeasureSpec, MeasureSpec)>,
    pub layouts: Vec<Rect>,
    pub draws: usize,
    pub insets: Vec<WindowInsets>,
    pub keys: Vec<KeyEvent>,
    pub attached: usize,
    pub detached: usize,
    pub layout_requests: Vec<NodeId>,
    pub initial_focus_requests: usize,
    pub state_changes: usize,
    pub focus_changes: Vec<bool>,
}

/// Host view with a fixed content size
pub struct TestHost {
    pub log: Arc<Mutex<HostLog>>,
    /// Size wanted under at-most constraints
    pub content: (i32, i32),
    /// Widths below this report the content as too small
    pub min_width: i32,
    pub visibility: Visibility,
    pub focused: bool,
    /// Node that requests layout during this many layout passes
    pub requester: Option<(NodeId, usize)>,
    measured: MeasuredSize,
    forced: HashSet<NodeId>,
}

impl TestHost {
    pub fn new() -> (Self, Arc<Mutex<HostLog>>) {
        let log = Arc::new(Mutex::new(HostLog::default()));
        let host = Self {
            log: log.clone(),
            content: (400, 300),
            min_width: 0,
            visibility: Visibility::Visible,
            focused: false,
            requester: None,
            measured: MeasuredSize::default(),
            forced: HashSet::new(),
        };
        (host, log)
    }

    fn resolve(spec: MeasureSpec, content: i32) -> i32 {
        match spec.mode {
            MeasureMode::Exactly => spec.size,
            MeasureMode::AtMost => content.min(spec.size),
            MeasureMode::Unspecified => content,
        }
    }
}

impl HostView for TestHost {
    fn measure(&mut self, width: MeasureSpec, height: MeasureSpec) -> MeasuredSize {
        self.log.lock().measures.push((width, height));
        let measured_width = Self::resolve(width, self.content.0);
        self.measured = MeasuredSize {
            width: measured_width,
            height: Self::resolve(height, self.content.1),
            too_small: measured_width < self.min_width,
        };
        self.measured
    }

    fn measured_size(&self) -> MeasuredSize {
        self.measured
    }

    fn layout(&mut self, frame: Rect, pass: &mut LayoutPass) {
        self.log.lock().layouts.push(frame);
        if let Some((node, remaining)) = self.requester.as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                self.forced.insert(*node);
                pass.request_layout(*node);
            }
        }
    }

    fn draw(&mut self, _canvas: &mut dyn Canvas) {
        self.log.lock().draws += 1;
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn is_attached(&self, _node: NodeId) -> bool {
        true
    }

    fn has_gone_ancestor(&self, _node: NodeId) -> bool {
        false
    }

    fn is_force_layout(&self, node: NodeId) -> bool {
        self.forced.contains(&node)
    }

    fn clear_force_layout(&mut self, node: NodeId) {
        self.forced.remove(&node);
    }

    fn request_layout(&mut self, node: NodeId) {
        self.forced.insert(node);
        self.log.lock().layout_requests.push(node);
    }

    fn dispatch_attached(&mut self) {
        self.log.lock().attached += 1;
    }

    fn dispatch_detached(&mut self) {
        self.log.lock().detached += 1;
    }

    fn dispatch_apply_insets(&mut self, insets: &WindowInsets) {
        self.log.lock().insets.push(*insets);
    }

    fn dispatch_window_focus_changed(&mut self, has_focus: bool) {
        self.log.lock().focus_changes.push(has_focus);
    }

    fn dispatch_window_state_changed(&mut self) {
        self.log.lock().state_changes += 1;
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn request_initial_focus(&mut self) -> bool {
        self.log.lock().initial_focus_requests += 1;
        self.focused = true;
        true
    }

    fn dispatch_key_event(&mut self, event: &KeyEvent) -> bool {
        self.log.lock().keys.push(event.clone());
        false
    }

    fn dispatch_pointer_event(&mut self, _event: &MotionEvent) -> bool {
        false
    }
}

// ============================================================================
// Compositor
// ============================================================================

/// One relayout as the compositor saw it
#[derive(Clone, Debug, PartialEq)]
pub struct RelayoutCall {
    pub width: i32,
    pub height: i32,
    pub params_sent: bool,
    pub visibility: Visibility,
}

/// In-memory compositor that grants whatever size is requested unless told otherwise
#[derive(Debug)]
pub struct FakeSession {
    pub add_error: Mutex<Option<PlatformError>>,
    pub add_result: Mutex<AddResult>,
    /// Frame to grant instead of the requested size
    pub grant: Mutex<Option<Rect>>,
    pub content_insets: Mutex<Insets>,
    pub with_surface: AtomicBool,
    /// Flags for upcoming relayouts, one per call
    pub next_flags: Mutex<VecDeque<RelayoutFlags>>,
    pub relayout_errors: Mutex<VecDeque<PlatformError>>,
    pub relayouts: Mutex<Vec<RelayoutCall>>,
    pub finished_draws: AtomicUsize,
    pub touch_modes: Mutex<Vec<bool>>,
    pub frees_memory: AtomicBool,
    pub out_of_memory_calls: AtomicUsize,
    pub removed: AtomicUsize,
    generation: AtomicUsize,
}

impl FakeSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            add_error: Mutex::new(None),
            add_result: Mutex::new(AddResult { app_visible: true, ..Default::default() }),
            grant: Mutex::new(None),
            content_insets: Mutex::new(Insets::ZERO),
            with_surface: AtomicBool::new(true),
            next_flags: Mutex::new(VecDeque::from([RelayoutFlags::FIRST_TIME])),
            relayout_errors: Mutex::new(VecDeque::new()),
            relayouts: Mutex::new(Vec::new()),
            finished_draws: AtomicUsize::new(0),
            touch_modes: Mutex::new(Vec::new()),
            frees_memory: AtomicBool::new(false),
            out_of_memory_calls: AtomicUsize::new(0),
            removed: AtomicUsize::new(0),
            generation: AtomicUsize::new(1),
        })
    }

    pub fn relayout_count(&self) -> usize {
        self.relayouts.lock().len()
    }

    pub fn finished_draws(&self) -> usize {
        self.finished_draws.load(Ordering::SeqCst)
    }
}

impl WindowSession for FakeSession {
    fn add_to_display(
        &self,
        _window: WindowToken,
        _params: &LayoutParams,
        _visibility: Visibility,
    ) -> cadence_platform::Result<AddResult> {
        match self.add_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(*self.add_result.lock()),
        }
    }

    fn relayout(&self, _window: WindowToken, request: &RelayoutRequest<'_>) -> cadence_platform::Result<RelayoutResult> {
        self.relayouts.lock().push(RelayoutCall {
            width: request.requested_width,
            height: request.requested_height,
            params_sent: request.params.is_some(),
            visibility: request.visibility,
        });
        if let Some(error) = self.relayout_errors.lock().pop_front() {
            return Err(error);
        }
        let frame = self
            .grant
            .lock()
            .unwrap_or_else(|| Rect::from_size(request.requested_width, request.requested_height));
        let surface = self.with_surface.load(Ordering::SeqCst).then(|| SurfaceHandle {
            id: 1,
            generation: self.generation.load(Ordering::SeqCst) as u32,
        });
        Ok(RelayoutResult {
            frame,
            content_insets: *self.content_insets.lock(),
            flags: self.next_flags.lock().pop_front().unwrap_or_default(),
            surface,
            ..Default::default()
        })
    }

    fn finish_drawing(&self, _window: WindowToken) {
        self.finished_draws.fetch_add(1, Ordering::SeqCst);
    }

    fn set_in_touch_mode(&self, in_touch_mode: bool) {
        self.touch_modes.lock().push(in_touch_mode);
    }

    fn out_of_memory(&self, _window: WindowToken) -> bool {
        self.out_of_memory_calls.fetch_add(1, Ordering::SeqCst);
        self.frees_memory.load(Ordering::SeqCst)
    }

    fn remove(&self, _window: WindowToken) {
        self.removed.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Drawing backends
// ============================================================================

#[derive(Debug, Default)]
pub struct RendererLog {
    pub enabled: bool,
    /// Results for upcoming initialize calls; `Ok(true)` once exhausted
    pub initialize_results: VecDeque<cadence_platform::Result<bool>>,
    pub initializations: usize,
    pub surface_updates: usize,
    pub setups: Vec<(i32, i32)>,
    pub draws: usize,
    pub pauses: usize,
    pub destroyed: usize,
}

pub struct FakeRenderer {
    pub log: Arc<Mutex<RendererLog>>,
}

impl FakeRenderer {
    pub fn new() -> (Self, Arc<Mutex<RendererLog>>) {
        let log = Arc::new(Mutex::new(RendererLog::default()));
        (Self { log: log.clone() }, log)
    }
}

impl Renderer for FakeRenderer {
    fn initialize(&mut self, _surface: &SurfaceHandle) -> cadence_platform::Result<bool> {
        let mut log = self.log.lock();
        log.initializations += 1;
        let result = log.initialize_results.pop_front().unwrap_or(Ok(true));
        if let Ok(true) = result {
            log.enabled = true;
        }
        result
    }

    fn update_surface(&mut self, _surface: &SurfaceHandle) -> cadence_platform::Result<()> {
        self.log.lock().surface_updates += 1;
        Ok(())
    }

    fn setup(&mut self, width: i32, height: i32, _surface_insets: &Insets) {
        self.log.lock().setups.push((width, height));
    }

    fn draw(&mut self, host: &mut dyn HostView) -> cadence_platform::Result<()> {
        self.log.lock().draws += 1;
        host.draw(&mut RecordingCanvas::default());
        Ok(())
    }

    fn pause_surface(&mut self) -> bool {
        self.log.lock().pauses += 1;
        false
    }

    fn destroy(&mut self) {
        let mut log = self.log.lock();
        log.destroyed += 1;
        log.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.log.lock().enabled
    }
}

#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub clips: Vec<Rect>,
    pub translations: Vec<(f32, f32)>,
    pub scales: Vec<(f32, f32)>,
}

impl Canvas for RecordingCanvas {
    fn translate(&mut self, dx: f32, dy: f32) {
        self.translations.push((dx, dy));
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.scales.push((sx, sy));
    }

    fn clip_rect(&mut self, rect: Rect) {
        self.clips.push(rect);
    }
}

#[derive(Debug, Default)]
pub struct SoftwareLog {
    pub lock_errors: VecDeque<PlatformError>,
    pub locks: usize,
    pub posts: usize,
    pub clips: Vec<Rect>,
}

pub struct FakeSoftware {
    pub log: Arc<Mutex<SoftwareLog>>,
    canvas: RecordingCanvas,
}

impl FakeSoftware {
    pub fn new() -> (Self, Arc<Mutex<SoftwareLog>>) {
        let log = Arc::new(Mutex::new(SoftwareLog::default()));
        (Self { log: log.clone(), canvas: RecordingCanvas::default() }, log)
    }
}

impl SoftwareSurface for FakeSoftware {
    fn lock_canvas(&mut self, _surface: &SurfaceHandle, dirty: &mut Rect) -> cadence_platform::Result<&mut dyn Canvas> {
        let mut log = self.log.lock();
        log.locks += 1;
        if let Some(error) = log.lock_errors.pop_front() {
            return Err(error);
        }
        log.clips.push(*dirty);
        self.canvas = RecordingCanvas::default();
        Ok(&mut self.canvas)
    }

    fn unlock_canvas_and_post(&mut self) -> cadence_platform::Result<()> {
        self.log.lock().posts += 1;
        Ok(())
    }
}

// ============================================================================
// Process, receivers, draw callbacks
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingProcess {
    pub terminations: AtomicUsize,
}

impl ProcessControl for RecordingProcess {
    fn terminate(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct RecordingReceiver {
    pub finished: Mutex<Vec<(u64, bool)>>,
}

impl InputEventReceiver for RecordingReceiver {
    fn finish_input_event(&self, seq: u64, handled: bool) {
        self.finished.lock().push((seq, handled));
    }
}

/// Acknowledges every reported draw from another thread
#[derive(Debug, Default)]
pub struct ThreadedAck {
    pub calls: AtomicUsize,
}

impl WindowDrawCallback for ThreadedAck {
    fn on_post_draw(&self, ack: DrawAck) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::spawn(move || ack.finish());
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Route test logs through the test harness; `RUST_LOG` selects what shows
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A UI thread driven by hand: time and vsync pulses only move when the test says so
pub struct Harness {
    pub time: Arc<ManualTimeSource>,
    pub vsync: Arc<ManualVsync>,
    pub ui: UiThread,
    frame: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(WindowConfig::standard())
    }

    pub fn with_config(config: WindowConfig) -> Self {
        init_tracing();
        let time = Arc::new(ManualTimeSource::new(1_000 * NANOS_PER_MS));
        let vsync = Arc::new(ManualVsync::new());
        let ui = UiThread::new(config, time.clone(), vsync.clone());
        Self { time, vsync, ui, frame: 0 }
    }

    /// Deliver one vsync pulse a frame later and run everything due
    pub fn frame(&mut self) {
        self.time.advance_ms(16);
        self.frame += 1;
        self.ui.clock().on_vsync(self.time.now_nanos(), self.frame);
        self.ui.run_pending();
    }

    pub fn frames(&mut self, count: usize) {
        for _ in 0..count {
            self.frame();
        }
    }

    pub fn add(&mut self, setup: WindowSetup) -> WindowId {
        match self.ui.add_window(setup) {
            Ok(id) => id,
            Err(e) => panic!("window add failed: {e}"),
        }
    }
}

/// Everything a typical test window is built from
pub struct TestWindow {
    pub session: Arc<FakeSession>,
    pub host: Arc<Mutex<HostLog>>,
    pub software: Arc<Mutex<SoftwareLog>>,
    pub setup: WindowSetup,
}

impl TestWindow {
    /// A full-screen software window on a 1080x1920 display
    pub fn new() -> Self {
        let (host, host_log) = TestHost::new();
        Self::with_host(host, host_log)
    }

    pub fn with_host(host: TestHost, host_log: Arc<Mutex<HostLog>>) -> Self {
        let session = FakeSession::new();
        let (software, software_log) = FakeSoftware::new();
        let setup = WindowSetup::new(host, session.clone(), LayoutParams::new("test"))
            .with_software_surface(software)
            .with_process_control(Arc::new(RecordingProcess::default()));
        Self { session, host: host_log, software: software_log, setup }
    }
}
