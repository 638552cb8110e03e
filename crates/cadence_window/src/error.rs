//! Window error types

use cadence_platform::PlatformError;
use thiserror::Error;

/// Window errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    /// The compositor refused to add the window
    #[error("Window add rejected: {0}")]
    AddRejected(String),

    /// The window was removed from its registry
    #[error("Window is gone")]
    WindowGone,

    /// A collaborator call failed
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for window operations
pub type Result<T> = std::result::Result<T, WindowError>;
