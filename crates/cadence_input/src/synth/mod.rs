//! Generators that turn unhandled input into D-pad and fallback keys

pub mod joystick;
pub mod keyboard;
pub mod touch_nav;
pub mod trackball;
pub mod velocity;

pub use joystick::JoystickSynthesizer;
pub use keyboard::{DefaultKeyCharacterMap, FallbackAction, KeyCharacterMap, KeyboardSynthesizer};
pub use touch_nav::TouchNavigationSynthesizer;
pub use trackball::TrackballSynthesizer;
pub use velocity::VelocityTracker;
