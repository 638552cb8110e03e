//! Trackball motion to D-pad keys
//!
//! Movement accumulates per axis. The first key fires after a small
//! movement, the second needs a larger cumulative one, and after that each
//! further unit fires a key. Fast movement raises an acceleration factor that
//! turns into key repeats; reversing direction resets the axis.

use cadence_frame::NANOS_PER_MS;
use cadence_platform::{
    InputSource, Key, KeyAction, KeyEvent, KeyFlags, MotionAction, MotionEvent, VIRTUAL_KEYBOARD,
};

use crate::stage::InputContext;

const FIRST_MOVEMENT_THRESHOLD: f32 = 0.5;
const SECOND_CUMULATIVE_MOVEMENT_THRESHOLD: f32 = 2.0;
const SUBSEQUENT_INCREMENTAL_MOVEMENT_THRESHOLD: f32 = 1.0;
/// Movement time, in ms, of one unit at which acceleration neither grows nor decays
const FAST_MOVE_TIME_MS: f32 = 150.0;
const ACCEL_MOVE_SCALING_FACTOR: f32 = 1.0 / 40.0;
const MAX_ACCELERATION: f32 = 20.0;

#[derive(Clone, Debug, PartialEq)]
struct TrackballAxis {
    position: f32,
    acceleration: f32,
    last_move_time_ms: i64,
    step: u8,
    dir: i8,
}

impl Default for TrackballAxis {
    fn default() -> Self {
        Self { position: 0.0, acceleration: 1.0, last_move_time_ms: 0, step: 0, dir: 0 }
    }
}

impl TrackballAxis {
    fn reset(&mut self, step: u8) {
        *self = Self { step, ..Self::default() };
    }

    /// Add movement and update acceleration; returns the absolute position
    fn collect(&mut self, offset: f32, time_ms: i64) -> f32 {
        let direction = if offset > 0.0 {
            1
        } else if offset < 0.0 {
            -1
        } else {
            0
        };
        // reversal starts over
        if direction != 0 && self.dir == -direction {
            self.reset(0);
        }
        if direction != 0 {
            self.dir = direction;
            let norm_time = offset.abs() * FAST_MOVE_TIME_MS;
            let delta = (time_ms - self.last_move_time_ms) as f32;
            self.last_move_time_ms = time_ms;
            let mut acceleration = self.acceleration;
            if delta < norm_time {
                let scale = (norm_time - delta) * ACCEL_MOVE_SCALING_FACTOR;
                if scale > 1.0 {
                    acceleration *= scale;
                }
                self.acceleration = acceleration.min(MAX_ACCELERATION);
            } else {
                let scale = (delta - norm_time) * ACCEL_MOVE_SCALING_FACTOR;
                if scale > 1.0 {
                    acceleration /= scale;
                }
                self.acceleration = acceleration.max(1.0);
            }
        }
        self.position += offset;
        self.position.abs()
    }

    /// Turn accumulated movement into a signed number of key presses
    fn generate(&mut self) -> i32 {
        let mut movement = 0;
        loop {
            let dir = if self.position >= 0.0 { 1 } else { -1 };
            match self.step {
                0 => {
                    if self.position.abs() < FIRST_MOVEMENT_THRESHOLD {
                        return movement;
                    }
                    movement += dir;
                    self.step = 1;
                }
                1 => {
                    if self.position.abs() < SECOND_CUMULATIVE_MOVEMENT_THRESHOLD {
                        return movement;
                    }
                    movement += dir;
                    self.position -= SECOND_CUMULATIVE_MOVEMENT_THRESHOLD * dir as f32;
                    self.step = 2;
                }
                _ => {
                    if self.position.abs() < SUBSEQUENT_INCREMENTAL_MOVEMENT_THRESHOLD {
                        return movement;
                    }
                    movement += dir;
                    self.position -= SUBSEQUENT_INCREMENTAL_MOVEMENT_THRESHOLD * dir as f32;
                    let accelerated = self.acceleration * 1.1;
                    if accelerated < MAX_ACCELERATION {
                        self.acceleration = accelerated;
                    }
                }
            }
        }
    }
}

/// Synthesizes D-pad keys from unhandled trackball motion
#[derive(Clone, Debug)]
pub struct TrackballSynthesizer {
    x: TrackballAxis,
    y: TrackballAxis,
    last_time_ms: Option<i64>,
    max_delay_ms: i64,
}

impl TrackballSynthesizer {
    pub fn new(max_delay_ms: i64) -> Self {
        Self { x: TrackballAxis::default(), y: TrackballAxis::default(), last_time_ms: None, max_delay_ms }
    }

    pub fn process(&mut self, event: &MotionEvent, cx: &mut InputContext<'_>) {
        let now = cx.now_nanos;
        let now_ms = now / NANOS_PER_MS;
        let idle = self.last_time_ms.map_or(true, |last| last + self.max_delay_ms < now_ms);
        if idle {
            // accumulated movement is stale
            self.x.reset(0);
            self.y.reset(0);
            self.last_time_ms = Some(now_ms);
        }

        let key = |action, key| {
            KeyEvent::new(action, key)
                .with_device(VIRTUAL_KEYBOARD, InputSource::Keyboard)
                .with_modifiers(event.modifiers)
                .with_flags(KeyFlags::FALLBACK)
                .at(now)
        };

        match event.action {
            MotionAction::Down => {
                self.x.reset(2);
                self.y.reset(2);
                cx.synthesize(key(KeyAction::Down, Key::Center));
            }
            MotionAction::Up => {
                self.x.reset(2);
                self.y.reset(2);
                cx.synthesize(key(KeyAction::Up, Key::Center));
            }
            _ => {}
        }

        let event_ms = event.event_time / NANOS_PER_MS;
        let x_off = self.x.collect(event.x(), event_ms);
        let y_off = self.y.collect(event.y(), event_ms);

        let (keycode, movement, acceleration) = if x_off > y_off {
            let movement = self.x.generate();
            let keycode = if movement > 0 { Key::Right } else { Key::Left };
            let acceleration = self.x.acceleration;
            if movement != 0 {
                self.y.reset(2);
            }
            (keycode, movement, acceleration)
        } else if y_off > 0.0 {
            let movement = self.y.generate();
            let keycode = if movement > 0 { Key::Down } else { Key::Up };
            let acceleration = self.y.acceleration;
            if movement != 0 {
                self.x.reset(2);
            }
            (keycode, movement, acceleration)
        } else {
            (Key::Unknown, 0, 1.0)
        };

        if movement == 0 {
            return;
        }
        let mut movement = movement.abs();
        let accelerated = (movement as f32 * acceleration) as i32;
        if accelerated > movement {
            movement -= 1;
            let repeats = (accelerated - movement) as u32;
            cx.synthesize(key(KeyAction::Multiple, keycode).repeated(now, repeats));
        }
        for _ in 0..movement {
            cx.synthesize(key(KeyAction::Down, keycode));
            cx.synthesize(key(KeyAction::Up, keycode));
        }
        self.last_time_ms = Some(now_ms);
    }

    /// Drop accumulated state after another stage took trackball input
    pub fn cancel(&mut self, cx: &mut InputContext<'_>) {
        self.last_time_ms = None;
        if cx.state.added {
            cx.ensure_touch_mode(false);
        }
    }
}
