//! Integer pixel geometry shared with the compositor

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixels, right and bottom exclusive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// A rectangle anchored at the origin
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn set_empty(&mut self) {
        *self = Rect::default();
    }

    /// Grow this rectangle to enclose `other`
    pub fn union(&mut self, other: &Rect) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
            return;
        }
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
    }

    /// Move the rectangle so its top-left corner is at (`left`, `top`)
    pub fn offset_to(&mut self, left: i32, top: i32) {
        let (width, height) = (self.width(), self.height());
        self.left = left;
        self.top = top;
        self.right = left + width;
        self.bottom = top + height;
    }
}

/// Four-sided insets in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Insets {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Insets {
    pub const ZERO: Insets = Insets { left: 0, top: 0, right: 0, bottom: 0 };

    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn is_zero(&self) -> bool {
        *self == Insets::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_with_empty() {
        let mut dirty = Rect::default();
        dirty.union(&Rect::new(10, 10, 20, 20));
        dirty.union(&Rect::new(0, 15, 12, 40));
        assert_eq!(dirty, Rect::new(0, 10, 20, 40));
    }

    #[test]
    fn test_offset_to_keeps_size() {
        let mut frame = Rect::new(0, 0, 100, 50);
        frame.offset_to(30, 40);
        assert_eq!(frame, Rect::new(30, 40, 130, 90));
    }
}
