//! Notifications pushed by the compositor to a window

use crate::geometry::{Insets, Rect};
use crate::window::DisplayMetrics;

/// New geometry reported by the compositor
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResizeReport {
    pub frame: Rect,
    pub overscan_insets: Insets,
    pub content_insets: Insets,
    pub visible_insets: Insets,
    pub stable_insets: Insets,
    pub outsets: Insets,
    pub backdrop_frame: Rect,
    /// The compositor waits for the next draw to be reported
    pub report_draw: bool,
    /// Relayout on the next traversal even if nothing changed
    pub force_layout: bool,
    /// The configuration changed along with the geometry
    pub configuration_changed: bool,
    pub always_consume_nav_bar: bool,
}

/// Window events
#[derive(Clone, Debug, PartialEq)]
pub enum WindowEvent {
    /// Window frame or insets changed
    Resized(ResizeReport),
    /// Window was moved
    Moved {
        /// New X position
        x: i32,
        /// New Y position
        y: i32,
    },
    /// Window gained or lost focus
    FocusChanged {
        has_focus: bool,
        /// Touch mode to adopt when gaining focus
        in_touch_mode: bool,
    },
    /// The owning application became visible or hidden
    AppVisibilityChanged(bool),
    /// The surface must be recreated
    GetNewSurface,
    /// The system UI visibility changed
    SystemUiVisibilityChanged {
        seq: u32,
        global_visibility: u32,
        local_value: u32,
        local_changes: u32,
    },
    /// Display state or size changed
    DisplayChanged(DisplayMetrics),
    /// Window close was requested
    CloseRequested,
}
