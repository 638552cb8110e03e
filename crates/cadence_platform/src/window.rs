//! Window attributes and display description

use serde::{Deserialize, Serialize};

use crate::geometry::Insets;

/// Requested size along one axis
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// Fill the space the compositor offers
    #[default]
    MatchParent,
    /// Size to the measured content
    WrapContent,
    /// An exact size in pixels
    Exact(i32),
}

/// Visibility of the window's root view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Visible,
    /// Laid out but not drawn
    Invisible,
    /// Neither laid out nor drawn
    Gone,
}

/// How the window reacts to the soft keyboard covering it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoftInputAdjust {
    #[default]
    Unspecified,
    Resize,
    Pan,
    Nothing,
}

/// Window layout attributes sent to the compositor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    /// Window title, used for diagnostics
    pub title: String,
    pub width: Dimension,
    pub height: Dimension,
    /// Share of extra horizontal space given to the window
    pub horizontal_weight: f32,
    /// Share of extra vertical space given to the window
    pub vertical_weight: f32,
    pub soft_input_adjust: SoftInputAdjust,
    /// Extra surface area around the window content
    pub surface_insets: Insets,
    /// Size the first traversal from the physical display instead of the configuration
    pub use_display_size: bool,
    /// Whether the window may receive text from the input method
    pub may_use_input_method: bool,
    /// Compatibility scale applied to app coordinates, if any
    pub compatibility_scale: Option<f32>,
    pub system_ui_visibility: u32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            title: "Cadence Window".to_string(),
            width: Dimension::MatchParent,
            height: Dimension::MatchParent,
            horizontal_weight: 0.0,
            vertical_weight: 0.0,
            soft_input_adjust: SoftInputAdjust::Unspecified,
            surface_insets: Insets::ZERO,
            use_display_size: false,
            may_use_input_method: true,
            compatibility_scale: None,
            system_ui_visibility: 0,
        }
    }
}

impl LayoutParams {
    /// Create layout params with a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the requested size
    pub fn size(mut self, width: Dimension, height: Dimension) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the layout weights
    pub fn weights(mut self, horizontal: f32, vertical: f32) -> Self {
        self.horizontal_weight = horizontal;
        self.vertical_weight = vertical;
        self
    }

    /// Set the soft input adjustment
    pub fn soft_input_adjust(mut self, adjust: SoftInputAdjust) -> Self {
        self.soft_input_adjust = adjust;
        self
    }

    /// Set whether the window can be an input method target
    pub fn may_use_input_method(mut self, may_use: bool) -> Self {
        self.may_use_input_method = may_use;
        self
    }

    /// Size the first traversal from the physical display
    pub fn use_display_size(mut self, use_display_size: bool) -> Self {
        self.use_display_size = use_display_size;
        self
    }

    /// Set the compatibility scale
    pub fn compatibility_scale(mut self, scale: Option<f32>) -> Self {
        self.compatibility_scale = scale;
        self
    }
}

/// Power state of a display
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayState {
    #[default]
    On,
    Off,
    Doze,
}

/// Display description used for first-traversal sizing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    /// Physical display size
    pub real_width: i32,
    pub real_height: i32,
    /// Size available to applications per the current configuration
    pub app_width: i32,
    pub app_height: i32,
    pub state: DisplayState,
}

impl DisplayMetrics {
    /// Metrics for a display with no decorations
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            real_width: width,
            real_height: height,
            app_width: width,
            app_height: height,
            state: DisplayState::On,
        }
    }

    /// Set the application area
    pub fn app_size(mut self, width: i32, height: i32) -> Self {
        self.app_width = width;
        self.app_height = height;
        self
    }
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self::new(1080, 1920)
    }
}
