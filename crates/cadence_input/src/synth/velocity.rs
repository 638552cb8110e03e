//! Pointer velocity estimation for fling detection

use std::collections::VecDeque;

use cadence_platform::MotionEvent;

/// Samples older than this relative to the newest are ignored
const HORIZON_NANOS: i64 = 100_000_000;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Sample {
    time: i64,
    x: f32,
    y: f32,
}

/// Estimates velocity from the first and last samples inside a short horizon
#[derive(Clone, Debug, Default)]
pub struct VelocityTracker {
    samples: VecDeque<Sample>,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn add_sample(&mut self, time: i64, x: f32, y: f32) {
        self.samples.push_back(Sample { time, x, y });
        while let Some(oldest) = self.samples.front() {
            if time - oldest.time <= HORIZON_NANOS {
                break;
            }
            self.samples.pop_front();
        }
    }

    /// Add every sample carried by `event`, history first
    pub fn add_movement(&mut self, event: &MotionEvent) {
        for sample in &event.history {
            self.add_sample(sample.event_time, sample.x, sample.y);
        }
        self.add_sample(event.event_time, event.x(), event.y());
    }

    /// Velocity in units per second, each axis clamped to `max`
    pub fn velocity(&self, max: f32) -> (f32, f32) {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return (0.0, 0.0);
        };
        let elapsed = last.time - first.time;
        if elapsed <= 0 {
            return (0.0, 0.0);
        }
        let seconds = elapsed as f64 / 1e9;
        let clamp = |v: f64| (v as f32).clamp(-max, max);
        (
            clamp(f64::from(last.x - first.x) / seconds),
            clamp(f64::from(last.y - first.y) / seconds),
        )
    }
}
