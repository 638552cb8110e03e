//! Per-frame timing record

use bitflags::bitflags;

bitflags! {
    /// Flags describing a frame
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FrameInfoFlags: i64 {
        /// The window layout changed during the frame
        const WINDOW_LAYOUT_CHANGED = 1;
        /// Animations ran on the render side
        const RT_ANIMATION = 2;
        /// Drawn with the software canvas
        const SURFACE_CANVAS = 4;
        /// Frames were skipped before this one
        const SKIPPED_FRAME = 8;
    }
}

/// Slot indices
pub mod slot {
    pub const FLAGS: usize = 0;
    pub const INTENDED_VSYNC: usize = 1;
    pub const VSYNC: usize = 2;
    pub const OLDEST_INPUT_EVENT: usize = 3;
    pub const NEWEST_INPUT_EVENT: usize = 4;
    pub const HANDLE_INPUT_START: usize = 5;
    pub const ANIMATION_START: usize = 6;
    pub const PERFORM_TRAVERSALS_START: usize = 7;
    pub const DRAW_START: usize = 8;
    pub const COUNT: usize = 9;
}

/// Timestamps of one frame, nanoseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    slots: [i64; slot::COUNT],
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self { slots: [0; slot::COUNT] }
    }
}

impl FrameInfo {
    /// Start a new frame
    pub fn set_vsync(&mut self, intended_vsync: i64, used_vsync: i64) {
        self.slots[slot::INTENDED_VSYNC] = intended_vsync;
        self.slots[slot::VSYNC] = used_vsync;
        self.slots[slot::OLDEST_INPUT_EVENT] = i64::MAX;
        self.slots[slot::NEWEST_INPUT_EVENT] = 0;
        self.slots[slot::FLAGS] = 0;
    }

    /// Widen the input window with a processed event
    pub fn update_input_event_time(&mut self, input_event_time: i64, oldest_input_event_time: i64) {
        if oldest_input_event_time < self.slots[slot::OLDEST_INPUT_EVENT] {
            self.slots[slot::OLDEST_INPUT_EVENT] = oldest_input_event_time;
        }
        if input_event_time > self.slots[slot::NEWEST_INPUT_EVENT] {
            self.slots[slot::NEWEST_INPUT_EVENT] = input_event_time;
        }
    }

    pub fn mark_input_handling_start(&mut self, now: i64) {
        self.slots[slot::HANDLE_INPUT_START] = now;
    }

    pub fn mark_animations_start(&mut self, now: i64) {
        self.slots[slot::ANIMATION_START] = now;
    }

    pub fn mark_perform_traversals_start(&mut self, now: i64) {
        self.slots[slot::PERFORM_TRAVERSALS_START] = now;
    }

    pub fn mark_draw_start(&mut self, now: i64) {
        self.slots[slot::DRAW_START] = now;
    }

    pub fn add_flags(&mut self, flags: FrameInfoFlags) {
        self.slots[slot::FLAGS] |= flags.bits();
    }

    pub fn flags(&self) -> FrameInfoFlags {
        FrameInfoFlags::from_bits_truncate(self.slots[slot::FLAGS])
    }

    pub fn get(&self, index: usize) -> i64 {
        self.slots[index]
    }

    pub fn intended_vsync(&self) -> i64 {
        self.slots[slot::INTENDED_VSYNC]
    }

    pub fn vsync(&self) -> i64 {
        self.slots[slot::VSYNC]
    }

    /// Oldest and newest input event times, if any input was recorded
    pub fn input_event_span(&self) -> Option<(i64, i64)> {
        let oldest = self.slots[slot::OLDEST_INPUT_EVENT];
        (oldest != i64::MAX).then(|| (oldest, self.slots[slot::NEWEST_INPUT_EVENT]))
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_vsync_resets_input_window() {
        let mut info = FrameInfo::default();
        info.set_vsync(100, 90);
        assert_eq!(info.input_event_span(), None);

        info.update_input_event_time(50, 40);
        info.update_input_event_time(45, 30);
        assert_eq!(info.input_event_span(), Some((30, 50)));

        info.add_flags(FrameInfoFlags::SURFACE_CANVAS);
        info.set_vsync(200, 200);
        assert_eq!(info.input_event_span(), None);
        assert!(info.flags().is_empty());
        assert_eq!(info.intended_vsync(), 200);
    }
}
