//! The concrete stages of the input chain

pub mod early;
pub mod ime;
pub mod native;
pub mod synthetic;
pub mod view;

pub use early::EarlyPostImeStage;
pub use ime::{ImeSession, ImeStage};
pub use native::{NativeInputQueue, NativePostImeStage, NativePreImeStage};
pub use synthetic::SyntheticStage;
pub use view::{FallbackEventHandler, NoFallback, ViewPostImeStage, ViewPreImeStage};
