//! Cadence Platform Contracts
//!
//! This crate provides the traits and types through which a window's frame
//! pipeline talks to the outside world.
//!
//! # Architecture
//!
//! - [`WindowSession`] - The compositor connection (add, relayout, finish drawing)
//! - [`Renderer`] / [`SoftwareSurface`] - Hardware and software drawing backends
//! - [`HostView`] - The root of the hosted view tree
//! - [`InputEvent`] - Key and motion events with device ids and sources
//! - [`WindowEvent`] - Notifications the compositor pushes to a window
//!
//! Implementations live with the embedder; tests use in-memory fakes.

mod error;
mod event;
mod geometry;
mod host;
mod input;
mod renderer;
mod session;
mod window;

// Re-export all public types
pub use error::{PlatformError, Result};
pub use event::{ResizeReport, WindowEvent};
pub use geometry::{Insets, Rect};
pub use host::{
    FocusDirection, HostView, LayoutPass, MeasureMode, MeasureSpec, MeasuredSize, NodeId,
    WindowInsets,
};
pub use input::{
    Axis, DeviceId, HistoricalSample, InputDevices, InputEvent, InputSource, Key, KeyAction,
    KeyEvent, KeyFlags, Modifiers, MotionAction, MotionEvent, MotionFlags, MotionRange,
    NoInputDevices, PointerCoords, SourceClass, VIRTUAL_KEYBOARD,
};
pub use renderer::{Canvas, Renderer, SoftwareSurface};
pub use session::{
    AddResult, RelayoutFlags, RelayoutRequest, RelayoutResult, SurfaceHandle, WindowSession,
    WindowToken,
};
pub use window::{
    Dimension, DisplayMetrics, DisplayState, LayoutParams, SoftInputAdjust, Visibility,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{PlatformError, Result};
    pub use crate::event::{ResizeReport, WindowEvent};
    pub use crate::geometry::{Insets, Rect};
    pub use crate::host::{HostView, LayoutPass, MeasureSpec, MeasuredSize, NodeId};
    pub use crate::input::{InputEvent, InputSource, Key, KeyAction, KeyEvent, MotionAction, MotionEvent};
    pub use crate::renderer::{Canvas, Renderer, SoftwareSurface};
    pub use crate::session::{RelayoutFlags, RelayoutResult, SurfaceHandle, WindowSession};
    pub use crate::window::{Dimension, LayoutParams, Visibility};
}
