//! Drawing backends

use crate::error::Result;
use crate::geometry::{Insets, Rect};
use crate::host::HostView;
use crate::session::SurfaceHandle;

/// Target of software drawing
pub trait Canvas {
    fn translate(&mut self, dx: f32, dy: f32);

    fn scale(&mut self, sx: f32, sy: f32);

    fn clip_rect(&mut self, rect: Rect);
}

/// Hardware renderer bound to a window surface
///
/// Resource exhaustion is reported as [`PlatformError::OutOfResources`](crate::PlatformError::OutOfResources).
pub trait Renderer {
    /// Bind to a new surface; returns whether the renderer was newly enabled
    fn initialize(&mut self, surface: &SurfaceHandle) -> Result<bool>;

    /// Rebind to a replaced surface
    fn update_surface(&mut self, surface: &SurfaceHandle) -> Result<()>;

    /// Configure for a new surface size
    fn setup(&mut self, width: i32, height: i32, surface_insets: &Insets);

    /// Draw the host tree
    fn draw(&mut self, host: &mut dyn HostView) -> Result<()>;

    /// Stop drawing into the current surface; returns true if a full redraw is needed afterwards
    fn pause_surface(&mut self) -> bool;

    /// Release the surface and all resources tied to it
    fn destroy(&mut self);

    /// Whether the renderer is bound and drawing
    fn is_enabled(&self) -> bool;

    /// Whether hardware drawing is wanted for this window
    fn is_requested(&self) -> bool {
        true
    }
}

/// Software drawing into a lockable surface
pub trait SoftwareSurface {
    /// Lock the surface; the backend may grow `dirty` to the area it needs redrawn
    fn lock_canvas(&mut self, surface: &SurfaceHandle, dirty: &mut Rect) -> Result<&mut dyn Canvas>;

    /// Post the drawn contents to the compositor
    fn unlock_canvas_and_post(&mut self) -> Result<()>;
}
