//! Frame clock configuration presets.

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};
use crate::time::NANOS_PER_MS;

/// Configuration for a frame clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameClockConfig {
    /// Drive frames from the display's vsync pulse instead of a timer.
    pub use_vsync: bool,
    /// Display refresh rate used to derive the frame interval.
    pub refresh_rate_hz: f32,
    /// Skipped-frame count at which a warning is logged.
    pub skipped_frame_warning_limit: i64,
    /// Commit-phase lateness, in frame intervals, that triggers frame time correction.
    pub commit_drift_intervals: i64,
    /// Delay between frames when vsync is disabled (ms).
    pub frame_delay_ms: i64,
}

impl Default for FrameClockConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl FrameClockConfig {
    /// Standard 60Hz vsync configuration.
    pub fn standard() -> Self {
        Self {
            use_vsync: true,
            refresh_rate_hz: 60.0,
            skipped_frame_warning_limit: 30,
            commit_drift_intervals: 2,
            frame_delay_ms: 10,
        }
    }

    /// Timer driven frames for hosts without a vsync source.
    pub fn timer() -> Self {
        Self {
            use_vsync: false,
            ..Self::standard()
        }
    }

    /// Parse a TOML document, filling unspecified keys from the standard preset.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| FrameError::Config(e.to_string()))
    }

    /// Set the refresh rate.
    pub fn with_refresh_rate(mut self, hz: f32) -> Self {
        self.refresh_rate_hz = hz;
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, use_vsync: bool) -> Self {
        self.use_vsync = use_vsync;
        self
    }

    /// Set the skipped-frame warning limit.
    pub fn with_skipped_frame_warning_limit(mut self, limit: i64) -> Self {
        self.skipped_frame_warning_limit = limit;
        self
    }

    /// Frame interval in nanoseconds.
    pub fn frame_interval_nanos(&self) -> i64 {
        let hz = if self.refresh_rate_hz > 0.0 { self.refresh_rate_hz } else { 60.0 };
        (1_000_000_000.0 / f64::from(hz)) as i64
    }

    /// Non-vsync frame delay in nanoseconds.
    pub fn frame_delay_nanos(&self) -> i64 {
        self.frame_delay_ms * NANOS_PER_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_interval() {
        assert_eq!(FrameClockConfig::standard().frame_interval_nanos(), 16_666_666);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FrameClockConfig::from_toml_str("refresh_rate_hz = 120.0\nuse_vsync = false\n")
            .unwrap();
        assert!(!config.use_vsync);
        assert_eq!(config.frame_interval_nanos(), 8_333_333);
        assert_eq!(config.skipped_frame_warning_limit, 30);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = FrameClockConfig::from_toml_str("refresh_rate_hz = \"fast\"").unwrap_err();
        assert!(matches!(err, FrameError::Config(_)));
    }
}
