//! Last stage: synthesize keys from input nothing else handled

use std::sync::Arc;

use cadence_platform::{InputDevices, InputEvent, InputSource, SourceClass};

use crate::config::InputConfig;
use crate::queued::{QueuedFlags, QueuedInputEvent};
use crate::stage::{InputContext, InputStage, StageKind, StageResult, SyntheticTimer};
use crate::synth::{
    JoystickSynthesizer, KeyCharacterMap, KeyboardSynthesizer, TouchNavigationSynthesizer, TrackballSynthesizer,
};

pub struct SyntheticStage {
    trackball: TrackballSynthesizer,
    joystick: JoystickSynthesizer,
    touch_navigation: TouchNavigationSynthesizer,
    keyboard: KeyboardSynthesizer,
}

impl SyntheticStage {
    pub fn new(config: &InputConfig, devices: Arc<dyn InputDevices>, key_map: Arc<dyn KeyCharacterMap>) -> Self {
        Self {
            trackball: TrackballSynthesizer::new(config.trackball_max_delay_ms),
            joystick: JoystickSynthesizer::new(config.key_repeat_timeout_ms, config.key_repeat_delay_ms),
            touch_navigation: TouchNavigationSynthesizer::new(devices, config),
            keyboard: KeyboardSynthesizer::new(key_map),
        }
    }
}

impl InputStage for SyntheticStage {
    fn kind(&self) -> StageKind {
        StageKind::Synthetic
    }

    fn on_process(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) -> StageResult {
        q.flags.insert(QueuedFlags::RESYNTHESIZED);
        let unhandled = q.should_send_to_synthesizer();
        match &q.event {
            InputEvent::Motion(motion) if motion.source.is_class(SourceClass::TRACKBALL) => {
                self.trackball.process(motion, cx);
                StageResult::FinishHandled
            }
            InputEvent::Motion(motion) if motion.source.is_class(SourceClass::JOYSTICK) => {
                self.joystick.process(motion, cx);
                StageResult::FinishHandled
            }
            InputEvent::Motion(motion) if motion.source == InputSource::TouchNavigation => {
                self.touch_navigation.process(motion, cx);
                StageResult::FinishHandled
            }
            InputEvent::Key(key) if unhandled => {
                self.keyboard.process(key, cx);
                StageResult::FinishHandled
            }
            _ => StageResult::Forward,
        }
    }

    fn on_deliver_to_next(&mut self, q: &mut QueuedInputEvent, cx: &mut InputContext<'_>) {
        if q.flags.contains(QueuedFlags::RESYNTHESIZED) {
            return;
        }
        // an earlier stage took the event; drop any gesture in progress for its class
        let InputEvent::Motion(motion) = &q.event else {
            return;
        };
        if motion.source.is_class(SourceClass::TRACKBALL) {
            self.trackball.cancel(cx);
        } else if motion.source.is_class(SourceClass::JOYSTICK) {
            self.joystick.cancel(cx);
        } else if motion.source == InputSource::TouchNavigation {
            self.touch_navigation.cancel(motion, cx);
        }
    }

    fn on_timer(&mut self, timer: SyntheticTimer, cx: &mut InputContext<'_>) {
        match timer {
            SyntheticTimer::JoystickRepeatX | SyntheticTimer::JoystickRepeatY => self.joystick.on_timer(timer, cx),
            SyntheticTimer::TouchNavigationFling => self.touch_navigation.on_timer(cx),
        }
    }
}
