//! Window configuration presets.

use serde::{Deserialize, Serialize};

use cadence_frame::FrameClockConfig;
use cadence_input::InputConfig;

use crate::error::{Result, WindowError};

/// Configuration for the windows of one UI thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Width tried first when measuring wrap-content windows on wide displays.
    pub preferred_dialog_width: Option<i32>,
    /// Longest wait for draw acknowledgements before reporting a draw (ms).
    pub draw_ack_timeout_ms: u64,
    /// Privileged processes never terminate themselves when memory relief is refused.
    pub privileged_process: bool,
    /// Frame clock shared by the windows.
    pub frame: FrameClockConfig,
    /// Input pipeline of each window.
    pub input: InputConfig,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl WindowConfig {
    /// Standard configuration.
    pub fn standard() -> Self {
        Self {
            preferred_dialog_width: None,
            draw_ack_timeout_ms: 1_000,
            privileged_process: false,
            frame: FrameClockConfig::standard(),
            input: InputConfig::standard(),
        }
    }

    /// Configuration for a system process with a dialog width preference.
    pub fn system() -> Self {
        Self {
            preferred_dialog_width: Some(320),
            privileged_process: true,
            ..Self::standard()
        }
    }

    /// Parse a TOML document, filling unspecified keys from the standard preset.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| WindowError::Config(e.to_string()))?;
        config.input.validate().map_err(|e| WindowError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Set the preferred dialog width.
    pub fn with_preferred_dialog_width(mut self, width: Option<i32>) -> Self {
        self.preferred_dialog_width = width;
        self
    }

    /// Set the draw acknowledgement timeout.
    pub fn with_draw_ack_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.draw_ack_timeout_ms = timeout_ms;
        self
    }

    /// Mark the process as privileged.
    pub fn with_privileged_process(mut self, privileged: bool) -> Self {
        self.privileged_process = privileged;
        self
    }

    /// Set the frame clock configuration.
    pub fn with_frame(mut self, frame: FrameClockConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Set the input configuration.
    pub fn with_input(mut self, input: InputConfig) -> Self {
        self.input = input;
        self
    }
}
