//! Compositor session contract
//!
//! A [`WindowSession`] is the window's connection to the compositor. The
//! compositor decides the final frame, insets and surface of the window when
//! it is relaid out, and is told when a requested draw has completed.

use bitflags::bitflags;

use crate::error::Result;
use crate::geometry::{Insets, Rect};
use crate::window::{LayoutParams, Visibility};

/// Identifies a window to the compositor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowToken(pub u64);

/// Identifies a drawing surface; the generation changes when the surface is replaced
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    pub id: u64,
    pub generation: u32,
}

bitflags! {
    /// Flags returned by a relayout
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RelayoutFlags: u32 {
        /// The window is in touch mode
        const IN_TOUCH_MODE = 0x1;
        /// First relayout since the window became visible
        const FIRST_TIME = 0x2;
        /// A new surface was created
        const SURFACE_CHANGED = 0x4;
        /// Being drag-resized in docked mode
        const DRAG_RESIZING_DOCKED = 0x8;
        /// Being drag-resized in freeform mode
        const DRAG_RESIZING_FREEFORM = 0x10;
        /// The surface was resized
        const SURFACE_RESIZED = 0x20;
        /// The navigation bar always consumes insets
        const CONSUME_ALWAYS_NAV_BAR = 0x40;
    }
}

/// Result of adding a window to the display
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddResult {
    pub in_touch_mode: bool,
    pub app_visible: bool,
    pub content_insets: Insets,
    pub stable_insets: Insets,
    pub outsets: Insets,
    pub always_consume_nav_bar: bool,
}

/// Parameters of a relayout call
#[derive(Clone, Debug, PartialEq)]
pub struct RelayoutRequest<'a> {
    /// Changed attributes, `None` when unchanged since the last call
    pub params: Option<&'a LayoutParams>,
    pub requested_width: i32,
    pub requested_height: i32,
    pub visibility: Visibility,
    pub insets_pending: bool,
}

/// Geometry decided by the compositor
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelayoutResult {
    pub frame: Rect,
    pub overscan_insets: Insets,
    pub content_insets: Insets,
    pub visible_insets: Insets,
    pub stable_insets: Insets,
    pub outsets: Insets,
    pub backdrop_frame: Rect,
    pub flags: RelayoutFlags,
    /// Valid surface, `None` when the window has none
    pub surface: Option<SurfaceHandle>,
}

/// Connection between a window and the compositor
pub trait WindowSession: Send + Sync {
    /// Add the window to the display
    fn add_to_display(
        &self,
        window: WindowToken,
        params: &LayoutParams,
        visibility: Visibility,
    ) -> Result<AddResult>;

    /// Ask the compositor for a new frame, insets and surface
    fn relayout(&self, window: WindowToken, request: &RelayoutRequest<'_>) -> Result<RelayoutResult>;

    /// Acknowledge a draw the compositor asked to be reported
    fn finish_drawing(&self, window: WindowToken);

    /// Report a touch mode change made by the window
    fn set_in_touch_mode(&self, in_touch_mode: bool);

    /// Ask the compositor to reclaim memory; false when nothing could be freed
    fn out_of_memory(&self, window: WindowToken) -> bool;

    /// Remove the window from the display
    fn remove(&self, window: WindowToken);
}
