//! Cadence Input Pipeline
//!
//! Input delivery for a window: a pending FIFO feeding a fixed chain of
//! stages, with async stages that keep per-device order, plus the
//! generators that turn unhandled input into D-pad and fallback keys.
//!
//! # Stage chain
//!
//! ```text
//! native-pre-ime -> view-pre-ime -> ime -> early-post-ime
//!     -> native-post-ime -> view-post-ime -> synthetic
//! ```
//!
//! Each stage forwards, finishes or (async stages only) defers an event.
//! A deferred event resumes through [`InputPipeline::complete`] on the
//! window's thread once its [`PendingCompletion`] is reported.

pub mod batch;
pub mod config;
pub mod deferred;
pub mod error;
pub mod pipeline;
pub mod queued;
pub mod stage;
pub mod stages;
pub mod synth;

#[cfg(test)]
mod testing;

pub use batch::{BatchedEvent, InputBatcher};
pub use config::InputConfig;
pub use deferred::DeferredQueue;
pub use error::{InputError, Result};
pub use pipeline::{InputCollaborators, InputPipeline, ProcessReport};
pub use queued::{EventPool, InputEventReceiver, PendingInputQueue, QueuedFlags, QueuedInputEvent, ReceiverRef};
pub use stage::{
    apply_touch_mode_locally, should_drop_input_event, AsyncDispatch, BatchRequest, CompletionSink, DeferredToken,
    InputContext, InputEffects, InputStage, InputState, PendingCompletion, StageKind, StageResult, SyntheticTimer,
    TimerRequest,
};
pub use stages::{FallbackEventHandler, ImeSession, NativeInputQueue, NoFallback};
pub use synth::{DefaultKeyCharacterMap, FallbackAction, KeyCharacterMap};
