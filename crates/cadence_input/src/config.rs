//! Input pipeline configuration presets.

use serde::{Deserialize, Serialize};

use crate::error::{InputError, Result};

/// Configuration for the input pipeline and its synthesizers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Number of recycled queued events kept for reuse.
    pub pool_capacity: usize,
    /// Delay before a held joystick direction starts repeating (ms).
    pub key_repeat_timeout_ms: i64,
    /// Interval between joystick key repeats (ms).
    pub key_repeat_delay_ms: i64,
    /// Idle time after which trackball accumulation restarts (ms).
    pub trackball_max_delay_ms: i64,
    /// Touch navigation movement per synthesized D-pad key (mm).
    pub touch_nav_tick_distance_mm: f32,
    /// Slowest touch navigation fling, in ticks per second.
    pub touch_nav_min_fling_ticks_per_second: f32,
    /// Fastest touch navigation fling, in ticks per second.
    pub touch_nav_max_fling_ticks_per_second: f32,
    /// Velocity multiplier applied after each fling tick.
    pub touch_nav_fling_tick_decay: f32,
    /// Pad size assumed when a device reports no resolution (mm).
    pub touch_nav_default_size_mm: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl InputConfig {
    /// Standard configuration.
    pub fn standard() -> Self {
        Self {
            pool_capacity: 10,
            key_repeat_timeout_ms: 500,
            key_repeat_delay_ms: 50,
            trackball_max_delay_ms: 250,
            touch_nav_tick_distance_mm: 12.0,
            touch_nav_min_fling_ticks_per_second: 6.0,
            touch_nav_max_fling_ticks_per_second: 20.0,
            touch_nav_fling_tick_decay: 0.8,
            touch_nav_default_size_mm: 48.0,
        }
    }

    /// Parse a TOML document, filling unspecified keys from the standard preset.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| InputError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the synthesizers cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("touch_nav_tick_distance_mm", self.touch_nav_tick_distance_mm),
            ("touch_nav_min_fling_ticks_per_second", self.touch_nav_min_fling_ticks_per_second),
            ("touch_nav_max_fling_ticks_per_second", self.touch_nav_max_fling_ticks_per_second),
            ("touch_nav_default_size_mm", self.touch_nav_default_size_mm),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(InputError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if !(0.0..1.0).contains(&self.touch_nav_fling_tick_decay) {
            return Err(InputError::Config(format!(
                "touch_nav_fling_tick_decay must be in [0, 1), got {}",
                self.touch_nav_fling_tick_decay
            )));
        }
        Ok(())
    }

    /// Set the pool capacity.
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Set the joystick key repeat timing.
    pub fn with_key_repeat(mut self, timeout_ms: i64, delay_ms: i64) -> Self {
        self.key_repeat_timeout_ms = timeout_ms;
        self.key_repeat_delay_ms = delay_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_overrides() {
        let config = InputConfig::from_toml_str("key_repeat_delay_ms = 30").unwrap();
        assert_eq!(config.key_repeat_delay_ms, 30);
        assert_eq!(config.key_repeat_timeout_ms, 500);
        assert_eq!(config.pool_capacity, 10);
    }

    #[test]
    fn test_non_positive_tick_distance_is_rejected() {
        let err = InputConfig::from_toml_str("touch_nav_tick_distance_mm = 0.0").unwrap_err();
        assert!(matches!(err, InputError::Config(ref msg) if msg.contains("touch_nav_tick_distance_mm")));
        assert!(InputConfig::from_toml_str("touch_nav_tick_distance_mm = -3.0").is_err());
        assert!(InputConfig::from_toml_str("touch_nav_fling_tick_decay = 1.0").is_err());
        assert!(InputConfig::standard().validate().is_ok());
    }
}
