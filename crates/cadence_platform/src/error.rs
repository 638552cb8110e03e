//! Platform error types

use thiserror::Error;

/// Errors reported by the external collaborators (compositor, renderer, surfaces)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The compositor or GPU could not allocate the requested resources
    #[error("Out of resources: {0}")]
    OutOfResources(String),

    /// A drawing surface could not be locked or posted
    #[error("Surface lock failed: {0}")]
    SurfaceLock(String),

    /// The remote compositor call failed
    #[error("Compositor call failed: {0}")]
    Compositor(String),

    /// The rendering backend failed for a reason other than resource exhaustion
    #[error("Renderer failure: {0}")]
    Renderer(String),

    /// The compositor refused to add the window
    #[error("Window add rejected: {0}")]
    AddRejected(String),

    /// Generic platform error
    #[error("Platform error: {0}")]
    Other(String),
}

impl PlatformError {
    /// Whether this error is a resource-exhaustion condition
    pub fn is_out_of_resources(&self) -> bool {
        matches!(self, PlatformError::OutOfResources(_))
    }
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;
