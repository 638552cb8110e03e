//! Surface state shared with other threads

use std::sync::Arc;

use parking_lot::Mutex;

use cadence_platform::{Rect, SurfaceHandle};

/// The window's surface and the geometry it was last given
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceState {
    /// Valid surface, `None` when the window has none
    pub handle: Option<SurfaceHandle>,
    pub frame: Rect,
    pub backdrop_frame: Rect,
}

/// Cloneable view of a window's surface
///
/// Only the owning window writes; render threads may read at any time.
#[derive(Clone, Default)]
pub struct SharedSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl SharedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SurfaceState {
        *self.state.lock()
    }

    pub fn handle(&self) -> Option<SurfaceHandle> {
        self.state.lock().handle
    }

    pub fn is_valid(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    pub fn frame(&self) -> Rect {
        self.state.lock().frame
    }

    pub(crate) fn set(&self, handle: Option<SurfaceHandle>, frame: Rect, backdrop_frame: Rect) {
        *self.state.lock() = SurfaceState { handle, frame, backdrop_frame };
    }

    pub(crate) fn set_frame(&self, frame: Rect) {
        self.state.lock().frame = frame;
    }

    /// Drop the surface handle, keeping the geometry
    pub(crate) fn release(&self) -> Option<SurfaceHandle> {
        self.state.lock().handle.take()
    }
}

impl std::fmt::Debug for SharedSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedSurface").field(&self.snapshot()).finish()
    }
}
