//! Touch navigation pad motion to D-pad keys
//!
//! Movement on the pad is measured in ticks. Each whole tick travelled along
//! the dominant axis sends a key down (or a repeat of the pending key). A
//! quick release along the pending key's axis keeps sending repeats at a
//! decaying rate until the rate drops below the minimum fling velocity.

use std::sync::Arc;

use cadence_platform::{
    Axis, DeviceId, InputDevices, InputSource, Key, KeyAction, KeyEvent, KeyFlags, Modifiers, MotionAction,
    MotionEvent,
};

use crate::config::InputConfig;
use crate::stage::{InputContext, SyntheticTimer};
use crate::synth::velocity::VelocityTracker;

#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingKey {
    key: Key,
    down_time: i64,
    repeat_count: u32,
    modifiers: Modifiers,
}

#[derive(Clone, Debug)]
struct Tracking {
    pointer_id: u32,
    velocity: VelocityTracker,
    last_x: f32,
    last_y: f32,
    accumulated_x: f32,
    accumulated_y: f32,
}

/// Pad geometry derived from the device's reported ranges
#[derive(Clone, Copy, Debug, PartialEq)]
struct PadMetrics {
    tick_distance: f32,
    min_fling_velocity: f32,
    max_fling_velocity: f32,
}

/// Synthesizes D-pad keys from unhandled touch navigation motion
pub struct TouchNavigationSynthesizer {
    devices: Arc<dyn InputDevices>,
    tick_distance_mm: f32,
    min_fling_ticks_per_second: f32,
    max_fling_ticks_per_second: f32,
    fling_tick_decay: f32,
    default_size_mm: f32,

    current: Option<(DeviceId, InputSource)>,
    metrics: Option<PadMetrics>,
    tracking: Option<Tracking>,
    consumed_movement: bool,
    pending: Option<PendingKey>,
    flinging: bool,
    fling_velocity: f32,
}

impl TouchNavigationSynthesizer {
    pub fn new(devices: Arc<dyn InputDevices>, config: &InputConfig) -> Self {
        Self {
            devices,
            tick_distance_mm: config.touch_nav_tick_distance_mm,
            min_fling_ticks_per_second: config.touch_nav_min_fling_ticks_per_second,
            max_fling_ticks_per_second: config.touch_nav_max_fling_ticks_per_second,
            fling_tick_decay: config.touch_nav_fling_tick_decay,
            default_size_mm: config.touch_nav_default_size_mm,
            current: None,
            metrics: None,
            tracking: None,
            consumed_movement: false,
            pending: None,
            flinging: false,
            fling_velocity: 0.0,
        }
    }

    pub fn process(&mut self, event: &MotionEvent, cx: &mut InputContext<'_>) {
        let time = event.event_time;
        if self.current != Some((event.device_id, event.source)) {
            self.finish_keys(time, cx);
            self.finish_tracking();
            self.current = Some((event.device_id, event.source));
            self.metrics = self.pad_metrics(event.device_id, event.source);
        }
        let Some(metrics) = self.metrics else {
            return;
        };

        match event.action {
            MotionAction::Down => {
                let caught_fling = self.flinging;
                self.finish_keys(time, cx);
                let mut velocity = VelocityTracker::new();
                velocity.add_movement(event);
                self.tracking = Some(Tracking {
                    pointer_id: event.pointers.first().map_or(0, |p| p.id),
                    velocity,
                    last_x: event.x(),
                    last_y: event.y(),
                    accumulated_x: 0.0,
                    accumulated_y: 0.0,
                });
                // a touch that only stops a fling must not count as a tap
                self.consumed_movement = caught_fling;
            }
            MotionAction::Move | MotionAction::Up => {
                let Some(pointer_id) = self.tracking.as_ref().map(|t| t.pointer_id) else {
                    return;
                };
                let Some(pointer) = event.pointers.iter().find(|p| p.id == pointer_id).copied() else {
                    self.finish_keys(time, cx);
                    self.finish_tracking();
                    return;
                };
                if let Some(tracking) = self.tracking.as_mut() {
                    tracking.velocity.add_movement(event);
                    tracking.accumulated_x += pointer.x - tracking.last_x;
                    tracking.accumulated_y += pointer.y - tracking.last_y;
                    tracking.last_x = pointer.x;
                    tracking.last_y = pointer.y;
                }
                self.consume_accumulated_movement(time, event.modifiers, metrics, cx);

                if event.action == MotionAction::Up {
                    if self.consumed_movement && self.pending.is_some() {
                        let (vx, vy) = self
                            .tracking
                            .as_ref()
                            .map_or((0.0, 0.0), |t| t.velocity.velocity(metrics.max_fling_velocity));
                        if !self.start_fling(time, vx, vy, metrics, cx) {
                            self.finish_keys(time, cx);
                        }
                    }
                    self.finish_tracking();
                }
            }
            MotionAction::Cancel => {
                self.finish_keys(time, cx);
                self.finish_tracking();
            }
            _ => {}
        }
    }

    /// Stop after another stage took an event from the current pad
    pub fn cancel(&mut self, event: &MotionEvent, cx: &mut InputContext<'_>) {
        if self.current == Some((event.device_id, event.source)) {
            self.finish_keys(event.event_time, cx);
            self.finish_tracking();
        }
    }

    /// The fling timer fired
    pub fn on_timer(&mut self, cx: &mut InputContext<'_>) {
        if !self.flinging {
            return;
        }
        let (Some(pending), Some(metrics)) = (self.pending, self.metrics) else {
            self.flinging = false;
            return;
        };
        let time = cx.now_nanos;
        self.send_key_down_or_repeat(time, pending.key, pending.modifiers, cx);
        self.fling_velocity *= self.fling_tick_decay;
        if !self.post_fling(time, metrics, cx) {
            self.flinging = false;
            self.finish_keys(time, cx);
        }
    }

    fn pad_metrics(&self, device: DeviceId, source: InputSource) -> Option<PadMetrics> {
        let x = self.devices.motion_range(device, Axis::X, source)?;
        let y = self.devices.motion_range(device, Axis::Y, source)?;
        let resolution = |range: cadence_platform::MotionRange| {
            if range.resolution > 0.0 {
                range.resolution
            } else {
                range.range() / self.default_size_mm
            }
        };
        let nominal = (resolution(x) + resolution(y)) * 0.5;
        let tick_distance = self.tick_distance_mm * nominal;
        if !(tick_distance > 0.0 && tick_distance.is_finite()) {
            tracing::warn!(device, ?source, tick_distance, "touch navigation pad has no usable tick distance, ignoring it");
            return None;
        }
        Some(PadMetrics {
            tick_distance,
            min_fling_velocity: self.min_fling_ticks_per_second * tick_distance,
            max_fling_velocity: self.max_fling_ticks_per_second * tick_distance,
        })
    }

    fn consume_accumulated_movement(
        &mut self,
        time: i64,
        modifiers: Modifiers,
        metrics: PadMetrics,
        cx: &mut InputContext<'_>,
    ) {
        let Some(tracking) = self.tracking.as_ref() else {
            return;
        };
        let (ax, ay) = (tracking.accumulated_x, tracking.accumulated_y);
        let tick = metrics.tick_distance;
        if ax.abs() >= ay.abs() {
            if ax.abs() >= tick {
                let rest = self.consume_axis(time, modifiers, ax, tick, Key::Left, Key::Right, cx);
                self.set_accumulated(rest, 0.0);
                self.consumed_movement = true;
            }
        } else if ay.abs() >= tick {
            let rest = self.consume_axis(time, modifiers, ay, tick, Key::Up, Key::Down, cx);
            self.set_accumulated(0.0, rest);
            self.consumed_movement = true;
        }
    }

    fn set_accumulated(&mut self, x: f32, y: f32) {
        if let Some(tracking) = self.tracking.as_mut() {
            tracking.accumulated_x = x;
            tracking.accumulated_y = y;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn consume_axis(
        &mut self,
        time: i64,
        modifiers: Modifiers,
        mut accumulator: f32,
        tick: f32,
        negative: Key,
        positive: Key,
        cx: &mut InputContext<'_>,
    ) -> f32 {
        while accumulator <= -tick {
            self.send_key_down_or_repeat(time, negative, modifiers, cx);
            accumulator += tick;
        }
        while accumulator >= tick {
            self.send_key_down_or_repeat(time, positive, modifiers, cx);
            accumulator -= tick;
        }
        accumulator
    }

    fn send_key_down_or_repeat(&mut self, time: i64, key: Key, modifiers: Modifiers, cx: &mut InputContext<'_>) {
        let pending = match self.pending {
            Some(mut pending) if pending.key == key => {
                pending.repeat_count += 1;
                pending.modifiers = modifiers;
                pending
            }
            _ => {
                self.send_key_up(time, cx);
                PendingKey { key, down_time: time, repeat_count: 0, modifiers }
            }
        };
        self.pending = Some(pending);
        cx.synthesize(self.key_event(KeyAction::Down, &pending, time).with_flags(KeyFlags::FALLBACK));
    }

    fn send_key_up(&mut self, time: i64, cx: &mut InputContext<'_>) {
        if let Some(pending) = self.pending.take() {
            let up = KeyEvent { repeat_count: 0, ..self.key_event(KeyAction::Up, &pending, time) };
            cx.synthesize(up);
        }
    }

    fn key_event(&self, action: KeyAction, pending: &PendingKey, time: i64) -> KeyEvent {
        let (device, source) = self.current.unwrap_or((0, InputSource::TouchNavigation));
        KeyEvent {
            down_time: pending.down_time,
            event_time: time,
            repeat_count: pending.repeat_count,
            ..KeyEvent::new(action, pending.key).with_device(device, source).with_modifiers(pending.modifiers)
        }
    }

    fn start_fling(&mut self, time: i64, vx: f32, vy: f32, metrics: PadMetrics, cx: &mut InputContext<'_>) -> bool {
        let min = metrics.min_fling_velocity;
        let velocity = match self.pending.map(|p| p.key) {
            Some(Key::Left) if -vx >= min && vy.abs() < min => -vx,
            Some(Key::Right) if vx >= min && vy.abs() < min => vx,
            Some(Key::Up) if -vy >= min && vx.abs() < min => -vy,
            Some(Key::Down) if vy >= min && vx.abs() < min => vy,
            _ => return false,
        };
        self.fling_velocity = velocity;
        self.flinging = self.post_fling(time, metrics, cx);
        self.flinging
    }

    fn post_fling(&mut self, time: i64, metrics: PadMetrics, cx: &mut InputContext<'_>) -> bool {
        if self.fling_velocity < metrics.min_fling_velocity {
            return false;
        }
        let delay = (f64::from(metrics.tick_distance) * 1e9 / f64::from(self.fling_velocity)) as i64;
        cx.schedule_timer(SyntheticTimer::TouchNavigationFling, time + delay);
        true
    }

    fn cancel_fling(&mut self, cx: &mut InputContext<'_>) {
        if self.flinging {
            cx.cancel_timer(SyntheticTimer::TouchNavigationFling);
            self.flinging = false;
        }
    }

    fn finish_keys(&mut self, time: i64, cx: &mut InputContext<'_>) {
        self.cancel_fling(cx);
        self.send_key_up(time, cx);
    }

    fn finish_tracking(&mut self) {
        self.tracking = None;
    }
}
