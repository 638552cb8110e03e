//! Joystick hat and stick motion to repeating D-pad keys

use cadence_frame::NANOS_PER_MS;
use cadence_platform::{Key, KeyAction, KeyEvent, MotionAction, MotionEvent};

use crate::stage::{InputContext, SyntheticTimer};

/// Axis deflection needed to count as a direction
const DIRECTION_THRESHOLD: f32 = 0.5;

fn axis_direction(value: f32) -> i8 {
    if value >= DIRECTION_THRESHOLD {
        1
    } else if value <= -DIRECTION_THRESHOLD {
        -1
    } else {
        0
    }
}

#[derive(Clone, Debug, Default)]
struct AxisState {
    direction: i8,
    /// Last down or repeat sent for the held direction
    held: Option<KeyEvent>,
}

/// Synthesizes D-pad keys from unhandled joystick motion
#[derive(Clone, Debug)]
pub struct JoystickSynthesizer {
    x: AxisState,
    y: AxisState,
    repeat_timeout_nanos: i64,
    repeat_delay_nanos: i64,
}

impl JoystickSynthesizer {
    pub fn new(repeat_timeout_ms: i64, repeat_delay_ms: i64) -> Self {
        Self {
            x: AxisState::default(),
            y: AxisState::default(),
            repeat_timeout_nanos: repeat_timeout_ms * NANOS_PER_MS,
            repeat_delay_nanos: repeat_delay_ms * NANOS_PER_MS,
        }
    }

    pub fn process(&mut self, event: &MotionEvent, cx: &mut InputContext<'_>) {
        match event.action {
            MotionAction::Cancel => self.cancel(cx),
            MotionAction::Move => self.update(event, true, cx),
            _ => {}
        }
    }

    /// Release held directions and stop repeating
    pub fn cancel(&mut self, cx: &mut InputContext<'_>) {
        let time = cx.now_nanos;
        self.update_axis(Axis::X, 0, time, None, cx);
        self.update_axis(Axis::Y, 0, time, None, cx);
    }

    /// A repeat timer fired
    pub fn on_timer(&mut self, timer: SyntheticTimer, cx: &mut InputContext<'_>) {
        let axis = match timer {
            SyntheticTimer::JoystickRepeatX => &mut self.x,
            SyntheticTimer::JoystickRepeatY => &mut self.y,
            SyntheticTimer::TouchNavigationFling => return,
        };
        let Some(held) = &axis.held else {
            return;
        };
        if !cx.state.has_window_focus {
            return;
        }
        let repeat = held.repeated(cx.now_nanos, held.repeat_count + 1);
        cx.synthesize(repeat.clone());
        cx.schedule_timer(timer, cx.now_nanos + self.repeat_delay_nanos);
        axis.held = Some(repeat);
    }

    fn update(&mut self, event: &MotionEvent, synthesize_new_keys: bool, cx: &mut InputContext<'_>) {
        let mut x = axis_direction(event.hat_x);
        if x == 0 {
            x = axis_direction(event.x());
        }
        let mut y = axis_direction(event.hat_y);
        if y == 0 {
            y = axis_direction(event.y());
        }
        let source = synthesize_new_keys.then_some(event);
        self.update_axis(Axis::X, x, event.event_time, source, cx);
        self.update_axis(Axis::Y, y, event.event_time, source, cx);
    }

    fn update_axis(
        &mut self,
        axis: Axis,
        direction: i8,
        time: i64,
        source: Option<&MotionEvent>,
        cx: &mut InputContext<'_>,
    ) {
        let (state, timer, negative, positive) = match axis {
            Axis::X => (&mut self.x, SyntheticTimer::JoystickRepeatX, Key::Left, Key::Right),
            Axis::Y => (&mut self.y, SyntheticTimer::JoystickRepeatY, Key::Up, Key::Down),
        };
        if direction == state.direction {
            return;
        }
        if let Some(held) = state.held.take() {
            cx.cancel_timer(timer);
            let up = KeyEvent { action: KeyAction::Up, repeat_count: 0, event_time: time, ..held };
            cx.synthesize(up);
        }
        state.direction = direction;

        let Some(event) = source else {
            return;
        };
        if direction == 0 {
            return;
        }
        let key = if direction > 0 { positive } else { negative };
        let down = KeyEvent::new(KeyAction::Down, key)
            .with_device(event.device_id, event.source)
            .with_modifiers(event.modifiers)
            .at(time);
        cx.synthesize(down.clone());
        cx.schedule_timer(timer, time + self.repeat_timeout_nanos);
        state.held = Some(down);
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}
