//! Cadence Window Root
//!
//! The per-window frame pipeline: a traversal state machine that measures,
//! relayouts with the compositor, lays out and draws a hosted view tree once
//! per frame, plus the registry of windows living on one UI thread.
//!
//! # Features
//!
//! - **Collapsed traversals**: any number of layout requests and invalidations
//!   before a frame run a single traversal
//! - **Surface ownership**: relayout results decide the surface the renderer
//!   binds to; out-of-resources failures release it and retry
//! - **Reported draws**: draws the compositor asked for wait on registered
//!   draw callbacks before `finish_drawing`
//! - **Input**: events reach the window through a sendable [`WindowProxy`] and
//!   run through the `cadence_input` stage chain on the UI thread
//!
//! # Example
//!
//! ```ignore
//! use cadence_window::*;
//!
//! let mut ui = UiThread::new(WindowConfig::standard(), time, vsync);
//! let id = ui.add_window(WindowSetup::new(host, session, LayoutParams::new("main")))?;
//! let proxy = ui.proxy(id)?;
//! // hand `proxy` to the compositor connection and the input receiver
//! ui.run();
//! ```

pub mod config;
pub mod draw;
pub mod error;
pub mod latch;
pub mod messages;
pub mod process;
pub mod proxy;
pub mod surface;
pub mod traversal;
pub mod ui_thread;
pub mod view_root;

#[cfg(test)]
mod testing;

pub use config::WindowConfig;
pub use error::{Result, WindowError};
pub use latch::{DrawAck, DrawLatch, WindowDrawCallback};
pub use messages::{UiMessage, WindowMessage, WHAT_CONSUME_BATCHED_INPUT, WHAT_TRAVERSAL};
pub use process::{AbortProcess, ProcessControl};
pub use proxy::WindowProxy;
pub use surface::{SharedSurface, SurfaceState};
pub use traversal::{ReportedInsets, TraversalStats, WindowLifecycle};
pub use ui_thread::{UiThread, WindowId};
pub use view_root::{ViewRoot, WindowSetup};
