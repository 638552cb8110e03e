//! Frame clock
//!
//! Coordinates the timing of input, animation, traversal and commit work for
//! the owner thread. Work is posted into one callback queue per phase. Once a
//! frame is scheduled the clock requests a vsync pulse (or arms a timer when
//! vsync is off); when the pulse arrives the owner thread runs [`FrameClock::handle_message`]
//! and every phase's due callbacks run in order with the same frame time.
//!
//! The clock never calls into the owner thread directly from another thread.
//! Anything that must happen there is posted through the [`ClockPort`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::callback_queue::{ActionTarget, CallbackQueue, CallbackToken, FrameAction, FRAME_CALLBACK_TOKEN};
use crate::config::FrameClockConfig;
use crate::error::{FrameError, Result};
use crate::frame_info::{FrameInfo, FrameInfoFlags};
use crate::time::{TimeSource, NANOS_PER_MS};
use crate::vsync::VsyncSource;

/// Callback phases, run in this order within a frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallbackPhase {
    Input = 0,
    Animation = 1,
    Traversal = 2,
    Commit = 3,
}

impl CallbackPhase {
    pub const ALL: [CallbackPhase; 4] = [
        CallbackPhase::Input,
        CallbackPhase::Animation,
        CallbackPhase::Traversal,
        CallbackPhase::Commit,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Work the clock asks the owner thread to perform
#[derive(Clone, Debug)]
pub enum ClockMessage {
    /// A vsync pulse arrived
    Vsync { timestamp_nanos: i64, frame: u64 },
    /// Timer-driven frame when vsync is off
    DoFrame,
    /// Request a vsync pulse from the owner thread
    ScheduleVsync,
    /// A delayed callback may have come due
    ScheduleCallback { phase: CallbackPhase, action: FrameAction },
}

impl ClockMessage {
    /// Whether this message is the delayed-callback wakeup for `action`
    pub fn is_schedule_for(&self, action: &FrameAction) -> bool {
        matches!(self, ClockMessage::ScheduleCallback { action: a, .. } if a.same_as(action))
    }
}

/// When a clock message should be delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostTime {
    /// Ahead of all queued messages
    Front,
    /// At an absolute time in nanoseconds
    At(i64),
}

/// The clock's link to its owner thread
///
/// Messages are asynchronous: sync barriers never hold them back.
pub trait ClockPort: Send + Sync {
    /// Whether the calling thread is the owner thread
    fn is_owner_thread(&self) -> bool;

    fn post(&self, message: ClockMessage, at: PostTime);

    /// Drop pending delayed-callback wakeups for `action`
    fn remove_scheduled_callbacks(&self, action: &FrameAction);
}

/// Frame counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames that ran their phases
    pub frames: u64,
    /// Total frames skipped because the owner thread was late
    pub skipped_frames: i64,
    /// Frames skipped before the most recent frame
    pub last_skipped_frames: i64,
}

struct ClockState {
    queues: [CallbackQueue; 4],
    frame_scheduled: bool,
    callbacks_running: bool,
    have_pending_vsync: bool,
    last_frame_time_nanos: i64,
    frame_info: FrameInfo,
    stats: FrameStats,
}

/// Per-thread frame scheduler
pub struct FrameClock {
    state: Mutex<ClockState>,
    config: FrameClockConfig,
    frame_interval_nanos: i64,
    time: Arc<dyn TimeSource>,
    vsync: Arc<dyn VsyncSource>,
    port: Arc<dyn ClockPort>,
}

impl FrameClock {
    pub fn new(
        config: FrameClockConfig,
        time: Arc<dyn TimeSource>,
        vsync: Arc<dyn VsyncSource>,
        port: Arc<dyn ClockPort>,
    ) -> Self {
        let frame_interval_nanos = config.frame_interval_nanos();
        tracing::debug!(interval_nanos = frame_interval_nanos, use_vsync = config.use_vsync, "frame clock created");
        Self {
            state: Mutex::new(ClockState {
                queues: Default::default(),
                frame_scheduled: false,
                callbacks_running: false,
                have_pending_vsync: false,
                last_frame_time_nanos: i64::MIN,
                frame_info: FrameInfo::default(),
                stats: FrameStats::default(),
            }),
            config,
            frame_interval_nanos,
            time,
            vsync,
            port,
        }
    }

    pub fn config(&self) -> &FrameClockConfig {
        &self.config
    }

    pub fn frame_interval_nanos(&self) -> i64 {
        self.frame_interval_nanos
    }

    pub fn now_nanos(&self) -> i64 {
        self.time.now_nanos()
    }

    // ========================================================================
    // Posting
    // ========================================================================

    /// Post a callback to run in the next frame
    pub fn post_callback(&self, phase: CallbackPhase, action: FrameAction, token: Option<CallbackToken>) {
        self.post_callback_delayed(phase, action, token, 0);
    }

    /// Post a callback to run in the first frame at least `delay_ms` from now
    pub fn post_callback_delayed(
        &self,
        phase: CallbackPhase,
        action: FrameAction,
        token: Option<CallbackToken>,
        delay_ms: i64,
    ) {
        let mut state = self.state.lock();
        let now = self.time.now_nanos();
        let due_time = now.saturating_add(delay_ms.max(0).saturating_mul(NANOS_PER_MS));
        state.queues[phase.index()].add_callback(due_time, action.clone(), token);

        if due_time <= now {
            self.schedule_frame_locked(&mut state, now);
        } else {
            self.port.post(ClockMessage::ScheduleCallback { phase, action }, PostTime::At(due_time));
        }
    }

    /// Remove callbacks matching `action` and `token`; `None` matches anything
    pub fn remove_callbacks(&self, phase: CallbackPhase, action: Option<&FrameAction>, token: Option<CallbackToken>) {
        let mut state = self.state.lock();
        state.queues[phase.index()].remove_callbacks(action, token);
        if let Some(action) = action {
            if token.is_none() {
                self.port.remove_scheduled_callbacks(action);
            }
        }
    }

    /// Post a closure that receives the frame time, run in the animation phase
    pub fn post_frame_callback(&self, callback: FrameAction) {
        self.post_frame_callback_delayed(callback, 0);
    }

    pub fn post_frame_callback_delayed(&self, callback: FrameAction, delay_ms: i64) {
        self.post_callback_delayed(CallbackPhase::Animation, callback, Some(FRAME_CALLBACK_TOKEN), delay_ms);
    }

    pub fn remove_frame_callback(&self, callback: &FrameAction) {
        self.remove_callbacks(CallbackPhase::Animation, Some(callback), Some(FRAME_CALLBACK_TOKEN));
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Frame time of the running frame; only valid inside a frame callback
    pub fn frame_time_nanos(&self) -> Result<i64> {
        let state = self.state.lock();
        if !state.callbacks_running {
            return Err(FrameError::NotInCallback);
        }
        Ok(state.last_frame_time_nanos)
    }

    pub fn frame_time_ms(&self) -> Result<i64> {
        self.frame_time_nanos().map(|t| t / NANOS_PER_MS)
    }

    /// Frame time of the most recent frame, for diagnostics
    pub fn last_frame_time_nanos(&self) -> i64 {
        self.state.lock().last_frame_time_nanos
    }

    pub fn is_frame_scheduled(&self) -> bool {
        self.state.lock().frame_scheduled
    }

    pub fn stats(&self) -> FrameStats {
        self.state.lock().stats
    }

    pub fn frame_info(&self) -> FrameInfo {
        self.state.lock().frame_info
    }

    pub fn update_input_event_time(&self, newest_nanos: i64, oldest_nanos: i64) {
        self.state.lock().frame_info.update_input_event_time(newest_nanos, oldest_nanos);
    }

    pub fn mark_draw_start(&self) {
        let now = self.time.now_nanos();
        self.state.lock().frame_info.mark_draw_start(now);
    }

    pub fn add_frame_info_flags(&self, flags: FrameInfoFlags) {
        self.state.lock().frame_info.add_flags(flags);
    }

    /// Human-readable state, one item per line
    pub fn dump(&self, prefix: &str) -> String {
        let state = self.state.lock();
        let mut out = format!("{prefix}FrameClock:\n");
        out.push_str(&format!("{prefix}  frame_scheduled={}\n", state.frame_scheduled));
        out.push_str(&format!("{prefix}  last_frame_time_nanos={}\n", state.last_frame_time_nanos));
        for phase in CallbackPhase::ALL {
            out.push_str(&format!("{prefix}  {:?}: {} pending\n", phase, state.queues[phase.index()].len()));
        }
        out.push_str(&format!(
            "{prefix}  frames={} skipped={}\n",
            state.stats.frames, state.stats.skipped_frames
        ));
        out
    }

    // ========================================================================
    // Vsync and messages
    // ========================================================================

    /// Vsync pulse; may be called from any thread
    pub fn on_vsync(&self, timestamp_nanos: i64, frame: u64) {
        let now = self.time.now_nanos();
        let mut timestamp_nanos = timestamp_nanos;
        if timestamp_nanos > now {
            tracing::warn!(
                ahead_ms = (timestamp_nanos - now) as f64 * 0.000_001,
                "frame time is in the future, check that vsync timestamps use the monotonic timebase"
            );
            timestamp_nanos = now;
        }

        let mut state = self.state.lock();
        if state.have_pending_vsync {
            tracing::warn!("already have a pending vsync event, there should only be one at a time");
        } else {
            state.have_pending_vsync = true;
        }
        drop(state);

        self.port.post(ClockMessage::Vsync { timestamp_nanos, frame }, PostTime::At(timestamp_nanos));
    }

    /// Handle a message on the owner thread
    ///
    /// `dispatch` receives every due [`FrameAction::Target`] with the frame time.
    pub fn handle_message(&self, message: ClockMessage, dispatch: &mut dyn FnMut(ActionTarget, i64)) {
        match message {
            ClockMessage::Vsync { timestamp_nanos, frame } => {
                self.state.lock().have_pending_vsync = false;
                self.do_frame(timestamp_nanos, frame, dispatch);
            }
            ClockMessage::DoFrame => {
                let now = self.time.now_nanos();
                self.do_frame(now, 0, dispatch);
            }
            ClockMessage::ScheduleVsync => {
                let state = self.state.lock();
                if state.frame_scheduled {
                    self.vsync.schedule_vsync();
                }
            }
            ClockMessage::ScheduleCallback { phase, .. } => {
                let mut state = self.state.lock();
                if !state.frame_scheduled {
                    let now = self.time.now_nanos();
                    if state.queues[phase.index()].has_due_callbacks(now) {
                        self.schedule_frame_locked(&mut state, now);
                    }
                }
            }
        }
    }

    /// Run one frame for the pulse at `frame_time_nanos`
    pub fn do_frame(&self, frame_time_nanos: i64, frame: u64, dispatch: &mut dyn FnMut(ActionTarget, i64)) {
        let mut frame_time_nanos = frame_time_nanos;
        {
            let mut state = self.state.lock();
            if !state.frame_scheduled {
                return;
            }

            let intended_frame_time_nanos = frame_time_nanos;
            let start_nanos = self.time.now_nanos();
            let jitter_nanos = start_nanos - frame_time_nanos;
            let mut skipped_frames = 0;
            if jitter_nanos >= self.frame_interval_nanos {
                skipped_frames = jitter_nanos / self.frame_interval_nanos;
                if skipped_frames >= self.config.skipped_frame_warning_limit {
                    tracing::info!(
                        skipped_frames,
                        "Skipped {} frames! The application may be doing too much work on its main thread.",
                        skipped_frames
                    );
                }
                let last_frame_offset = jitter_nanos % self.frame_interval_nanos;
                tracing::debug!(
                    jitter_ms = jitter_nanos as f64 * 0.000_001,
                    offset_ms = last_frame_offset as f64 * 0.000_001,
                    "missed vsync, skipping frames and adjusting frame time"
                );
                frame_time_nanos = start_nanos - last_frame_offset;
            }

            if frame_time_nanos < state.last_frame_time_nanos {
                tracing::debug!("frame time appears to be going backwards, waiting for next vsync");
                self.schedule_vsync_locked();
                return;
            }

            state.frame_info.set_vsync(intended_frame_time_nanos, frame_time_nanos);
            if skipped_frames > 0 {
                state.frame_info.add_flags(FrameInfoFlags::SKIPPED_FRAME);
            }
            state.frame_scheduled = false;
            state.last_frame_time_nanos = frame_time_nanos;
            state.stats.frames += 1;
            state.stats.skipped_frames += skipped_frames;
            state.stats.last_skipped_frames = skipped_frames;
            state.frame_info.mark_input_handling_start(start_nanos);
        }
        tracing::trace!(frame, frame_time_nanos, "frame");

        self.do_callbacks(CallbackPhase::Input, frame_time_nanos, dispatch);

        let now = self.time.now_nanos();
        self.state.lock().frame_info.mark_animations_start(now);
        self.do_callbacks(CallbackPhase::Animation, frame_time_nanos, dispatch);

        let now = self.time.now_nanos();
        self.state.lock().frame_info.mark_perform_traversals_start(now);
        self.do_callbacks(CallbackPhase::Traversal, frame_time_nanos, dispatch);

        self.do_callbacks(CallbackPhase::Commit, frame_time_nanos, dispatch);
    }

    fn do_callbacks(&self, phase: CallbackPhase, frame_time_nanos: i64, dispatch: &mut dyn FnMut(ActionTarget, i64)) {
        let mut frame_time_nanos = frame_time_nanos;
        let callbacks = {
            let mut state = self.state.lock();
            let now = self.time.now_nanos();
            let callbacks = state.queues[phase.index()].extract_due_callbacks(now);
            if callbacks.is_empty() {
                return;
            }
            state.callbacks_running = true;

            if phase == CallbackPhase::Commit {
                let jitter_nanos = now - frame_time_nanos;
                if jitter_nanos >= self.config.commit_drift_intervals * self.frame_interval_nanos {
                    let last_frame_offset = jitter_nanos % self.frame_interval_nanos + self.frame_interval_nanos;
                    tracing::debug!(
                        late_ms = jitter_nanos as f64 * 0.000_001,
                        "commit delayed, setting frame time to the last vsync before commit"
                    );
                    frame_time_nanos = now - last_frame_offset;
                    state.last_frame_time_nanos = frame_time_nanos;
                }
            }
            callbacks
        };

        let _running = RunningGuard(self);
        for record in callbacks {
            match record.action {
                FrameAction::Callback(callback) => callback(frame_time_nanos),
                FrameAction::Target(target) => dispatch(target, frame_time_nanos),
            }
        }
    }

    fn schedule_frame_locked(&self, state: &mut ClockState, now: i64) {
        if state.frame_scheduled {
            return;
        }
        state.frame_scheduled = true;
        if self.config.use_vsync {
            if self.port.is_owner_thread() {
                self.schedule_vsync_locked();
            } else {
                self.port.post(ClockMessage::ScheduleVsync, PostTime::Front);
            }
        } else {
            let next_frame_time = if state.last_frame_time_nanos == i64::MIN {
                now
            } else {
                (state.last_frame_time_nanos + self.config.frame_delay_nanos()).max(now)
            };
            tracing::trace!(next_frame_time, "scheduling next frame without vsync");
            self.port.post(ClockMessage::DoFrame, PostTime::At(next_frame_time));
        }
    }

    fn schedule_vsync_locked(&self) {
        self.vsync.schedule_vsync();
    }
}

struct RunningGuard<'a>(&'a FrameClock);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.state.lock().callbacks_running = false;
    }
}
