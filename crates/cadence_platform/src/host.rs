//! Host view tree contract
//!
//! The window drives a tree of views it does not own the details of. The
//! [`HostView`] trait is the root of that tree as seen by the window: measure,
//! layout and draw entry points, input dispatch, focus queries and
//! notifications.

use crate::geometry::{Insets, Rect};
use crate::input::{KeyEvent, MotionEvent};
use crate::renderer::Canvas;
use crate::window::{Dimension, Visibility};

/// Identifies a node of the host tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// How a measure constraint applies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeasureMode {
    /// No constraint
    Unspecified,
    /// Exactly `size`
    Exactly,
    /// At most `size`
    AtMost,
}

/// Measure constraint along one axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeasureSpec {
    pub mode: MeasureMode,
    pub size: i32,
}

impl MeasureSpec {
    pub const fn exactly(size: i32) -> Self {
        Self { mode: MeasureMode::Exactly, size }
    }

    pub const fn at_most(size: i32) -> Self {
        Self { mode: MeasureMode::AtMost, size }
    }

    /// Constraint for the root view given the window size and requested dimension
    pub fn root(window_size: i32, dimension: Dimension) -> Self {
        match dimension {
            Dimension::MatchParent => Self::exactly(window_size),
            Dimension::WrapContent => Self::at_most(window_size),
            Dimension::Exact(size) => Self::exactly(size),
        }
    }
}

/// Result of measuring the root view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MeasuredSize {
    pub width: i32,
    pub height: i32,
    /// The content did not fit the offered width
    pub too_small: bool,
}

/// Direction of a focus move
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FocusDirection {
    Left,
    Up,
    Right,
    Down,
    Forward,
    Backward,
}

/// Insets dispatched to the host tree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WindowInsets {
    pub overscan: Insets,
    pub content: Insets,
    pub stable: Insets,
    pub outsets: Insets,
    pub always_consume_nav_bar: bool,
}

/// Layout requests made while a layout pass runs
///
/// The first pass accepts requests so they can be honored by a second,
/// synchronous pass. Requests made during the second pass are recorded but
/// refused; the window defers them to the next frame.
#[derive(Debug, Default)]
pub struct LayoutPass {
    second_pass: bool,
    requests: Vec<NodeId>,
}

impl LayoutPass {
    pub fn first() -> Self {
        Self::default()
    }

    pub fn second() -> Self {
        Self { second_pass: true, requests: Vec::new() }
    }

    pub fn is_second_pass(&self) -> bool {
        self.second_pass
    }

    /// Record a layout request from `node`; returns whether the request may proceed now
    pub fn request_layout(&mut self, node: NodeId) -> bool {
        if !self.requests.contains(&node) {
            self.requests.push(node);
        }
        !self.second_pass
    }

    pub fn requests(&self) -> &[NodeId] {
        &self.requests
    }

    pub fn take_requests(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.requests)
    }
}

/// Root of the view tree hosted by a window
pub trait HostView {
    // ------------------------------------------------------------------------
    // Measure, layout, draw

    /// Measure the tree under the given constraints
    fn measure(&mut self, width: MeasureSpec, height: MeasureSpec) -> MeasuredSize;

    /// Size from the last measure
    fn measured_size(&self) -> MeasuredSize;

    /// Lay out the tree within `frame`; nodes requesting layout report through `pass`
    fn layout(&mut self, frame: Rect, pass: &mut LayoutPass);

    /// Draw the tree
    fn draw(&mut self, canvas: &mut dyn Canvas);

    /// Mark every node as needing layout
    fn force_layout(&mut self) {}

    fn visibility(&self) -> Visibility;

    // ------------------------------------------------------------------------
    // Layout requests made during layout

    fn is_attached(&self, node: NodeId) -> bool;

    /// Whether any ancestor of `node` is gone
    fn has_gone_ancestor(&self, node: NodeId) -> bool;

    fn is_force_layout(&self, node: NodeId) -> bool;

    fn clear_force_layout(&mut self, node: NodeId);

    /// Re-issue a layout request for `node`
    fn request_layout(&mut self, node: NodeId);

    // ------------------------------------------------------------------------
    // Notifications

    fn dispatch_attached(&mut self) {}

    fn dispatch_detached(&mut self) {}

    fn dispatch_apply_insets(&mut self, insets: &WindowInsets);

    fn dispatch_window_visibility_changed(&mut self, _visibility: Visibility) {}

    fn dispatch_window_focus_changed(&mut self, _has_focus: bool) {}

    /// Notify accessibility that the window state changed
    fn dispatch_window_state_changed(&mut self) {}

    fn dispatch_system_ui_visibility_changed(&mut self, _visibility: u32) {}

    fn dispatch_window_moved(&mut self, _x: i32, _y: i32) {}

    /// Returns true if any node changed state
    fn on_touch_mode_changed(&mut self, _in_touch_mode: bool) -> bool {
        false
    }

    // ------------------------------------------------------------------------
    // Focus

    fn has_focus(&self) -> bool;

    /// Give focus to the initial focusable node
    fn request_initial_focus(&mut self) -> bool {
        false
    }

    fn has_focused_view(&self) -> bool {
        self.has_focus()
    }

    /// Move focus from the focused node in `direction`
    fn move_focus(&mut self, _direction: FocusDirection) -> bool {
        false
    }

    /// Offer a move no node could take to the focused node
    fn dispatch_unhandled_move(&mut self, _direction: FocusDirection) -> bool {
        false
    }

    // ------------------------------------------------------------------------
    // Input dispatch

    fn dispatch_key_event_pre_ime(&mut self, _event: &KeyEvent) -> bool {
        false
    }

    fn dispatch_key_event(&mut self, event: &KeyEvent) -> bool;

    fn dispatch_key_shortcut_event(&mut self, _event: &KeyEvent) -> bool {
        false
    }

    fn dispatch_pointer_event(&mut self, event: &MotionEvent) -> bool;

    /// Whether the last pointer dispatch asked for unbuffered delivery
    fn take_unbuffered_dispatch_request(&mut self) -> bool {
        false
    }

    fn dispatch_trackball_event(&mut self, _event: &MotionEvent) -> bool {
        false
    }

    fn dispatch_generic_motion_event(&mut self, _event: &MotionEvent) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_measure_spec() {
        assert_eq!(MeasureSpec::root(500, Dimension::MatchParent), MeasureSpec::exactly(500));
        assert_eq!(MeasureSpec::root(500, Dimension::WrapContent), MeasureSpec::at_most(500));
        assert_eq!(MeasureSpec::root(500, Dimension::Exact(120)), MeasureSpec::exactly(120));
    }

    #[test]
    fn test_second_pass_refuses_requests() {
        let mut first = LayoutPass::first();
        assert!(first.request_layout(NodeId(1)));
        assert!(first.request_layout(NodeId(1)));
        assert_eq!(first.requests(), &[NodeId(1)]);

        let mut second = LayoutPass::second();
        assert!(!second.request_layout(NodeId(2)));
        assert_eq!(second.take_requests(), vec![NodeId(2)]);
    }
}
