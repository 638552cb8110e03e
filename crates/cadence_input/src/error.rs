//! Input pipeline error types

use thiserror::Error;

use crate::stage::StageKind;

/// Errors from the input pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// An async completion arrived for an event not deferred at that stage
    #[error("No deferred event {seq} at stage {stage:?}")]
    UnknownDeferredEvent { stage: StageKind, seq: u64 },

    /// The configuration could not be parsed or holds unusable values
    #[error("Invalid input configuration: {0}")]
    Config(String),
}

/// Result type for input pipeline operations
pub type Result<T> = std::result::Result<T, InputError>;
