//! Cadence Frame Clock
//!
//! Vsync-aligned scheduling for a single owner thread.
//!
//! # Features
//!
//! - **Callback phases**: input, animation, traversal and commit callbacks run
//!   in that order within each frame, sharing one frame time
//! - **Jitter correction**: late pulses realign the frame time to the vsync grid
//!   and count skipped frames
//! - **Frame info**: per-frame timestamps for input, animation, traversal and draw
//! - **Message queue**: time-ordered owner-thread queue with sync barriers
//!
//! # Example
//!
//! ```ignore
//! use cadence_frame::*;
//!
//! let clock = FrameClock::new(FrameClockConfig::standard(), time, vsync, port);
//! clock.post_frame_callback(FrameAction::callback(|frame_time| {
//!     // advance animations to frame_time
//! }));
//! ```

pub mod callback_queue;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame_info;
pub mod message_queue;
pub mod time;
pub mod vsync;

pub use callback_queue::{
    ActionTarget, CallbackQueue, CallbackRecord, CallbackToken, FrameAction, FrameCallback,
    FRAME_CALLBACK_TOKEN,
};
pub use clock::{CallbackPhase, ClockMessage, ClockPort, FrameClock, FrameStats, PostTime};
pub use config::FrameClockConfig;
pub use error::{FrameError, Result};
pub use frame_info::{FrameInfo, FrameInfoFlags};
pub use message_queue::{BarrierToken, MessageQueue};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource, NANOS_PER_MS};
pub use vsync::{ManualVsync, VsyncSource};
