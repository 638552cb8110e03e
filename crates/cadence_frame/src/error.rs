//! Frame clock error types

use thiserror::Error;

/// Errors from the frame clock and the owner-thread message queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame time was queried outside of a running frame callback
    #[error("This method must be called from within a frame callback")]
    NotInCallback,

    /// The sync barrier was already removed or never posted
    #[error("The specified message queue synchronization barrier token has not been posted or has already been removed")]
    BarrierNotFound,

    /// The configuration could not be parsed
    #[error("Invalid frame clock configuration: {0}")]
    Config(String),
}

/// Result type for frame clock operations
pub type Result<T> = std::result::Result<T, FrameError>;
