//! Input event types for keys and motion
//!
//! Events carry a device id, a source and nanosecond timestamps. The source
//! determines the source class used by the input stages to route an event
//! (pointer, trackball, joystick, ...).

use bitflags::bitflags;
use smallvec::SmallVec;

/// Identifier of the physical (or virtual) device that produced an event
pub type DeviceId = i32;

/// Device id used for events synthesized by the input pipeline
pub const VIRTUAL_KEYBOARD: DeviceId = -1;

bitflags! {
    /// Coarse classification of input sources
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SourceClass: u8 {
        /// Buttons (keyboards, D-pads, gamepad buttons)
        const BUTTON = 0x01;
        /// Absolute pointers in display coordinates (touchscreen, mouse, stylus)
        const POINTER = 0x02;
        /// Relative motion (trackball)
        const TRACKBALL = 0x04;
        /// Absolute positions not mapped to the display (touchpad)
        const POSITION = 0x08;
        /// Joystick axes
        const JOYSTICK = 0x10;
    }
}

/// Where an input event came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InputSource {
    Keyboard,
    Dpad,
    Gamepad,
    Touchscreen,
    Mouse,
    Stylus,
    Trackball,
    Touchpad,
    TouchNavigation,
    Joystick,
    RotaryEncoder,
    #[default]
    Unknown,
}

impl InputSource {
    /// The source class of this source
    pub fn class(self) -> SourceClass {
        match self {
            InputSource::Keyboard | InputSource::Dpad | InputSource::Gamepad => SourceClass::BUTTON,
            InputSource::Touchscreen | InputSource::Mouse | InputSource::Stylus => {
                SourceClass::POINTER
            }
            InputSource::Trackball => SourceClass::TRACKBALL,
            InputSource::Touchpad => SourceClass::POSITION,
            InputSource::Joystick => SourceClass::JOYSTICK,
            InputSource::TouchNavigation | InputSource::RotaryEncoder | InputSource::Unknown => {
                SourceClass::empty()
            }
        }
    }

    /// Check whether this source belongs to the given class
    pub fn is_class(self, class: SourceClass) -> bool {
        self.class().intersects(class)
    }
}

// ============================================================================
// Key Events
// ============================================================================

/// Key press/release action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyAction {
    /// Key was pressed
    Down,
    /// Key was released
    Up,
    /// Multiple repeated presses or a character sequence
    Multiple,
}

bitflags! {
    /// Per-event key flags
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct KeyFlags: u32 {
        /// The key event was canceled before completion
        const CANCELED = 0x0001;
        /// The event was synthesized as a fallback for an unhandled key
        const FALLBACK = 0x0002;
        /// The event must not take the window out of touch mode
        const KEEP_TOUCH_MODE = 0x0004;
        /// The event came from a soft keyboard
        const SOFT_KEYBOARD = 0x0008;
    }
}

/// Modifier key state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Shift key is held
    pub shift: bool,
    /// Control key is held
    pub ctrl: bool,
    /// Alt key is held
    pub alt: bool,
    /// Meta key is held
    pub meta: bool,
}

impl Modifiers {
    /// Control only
    pub const CTRL: Modifiers = Modifiers { shift: false, ctrl: true, alt: false, meta: false };
    /// Alt only
    pub const ALT: Modifiers = Modifiers { shift: false, ctrl: false, alt: true, meta: false };
    /// Meta only
    pub const META: Modifiers = Modifiers { shift: false, ctrl: false, alt: false, meta: true };

    /// Check if no modifiers are held
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.ctrl && !self.alt && !self.meta
    }

    /// Check if only shift is held
    pub fn shift_only(&self) -> bool {
        self.shift && !self.ctrl && !self.alt && !self.meta
    }

    /// Check if only ctrl is held
    pub fn ctrl_only(&self) -> bool {
        !self.shift && self.ctrl && !self.alt && !self.meta
    }

    /// Check if only alt is held
    pub fn alt_only(&self) -> bool {
        !self.shift && !self.ctrl && self.alt && !self.meta
    }

    /// Check if only meta is held
    pub fn meta_only(&self) -> bool {
        !self.shift && !self.ctrl && !self.alt && self.meta
    }
}

/// Key codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    // Letters
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    // Numbers
    Num0, Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9,

    // Special keys
    Space,
    Enter,
    Escape,
    Backspace,
    Tab,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,

    // Directional pad (arrow keys on keyboards)
    Left,
    Right,
    Up,
    Down,
    Center,

    // System keys
    Back,
    SystemHome,
    Menu,

    // Modifier keys (for tracking state)
    Shift,
    Ctrl,
    Alt,
    Meta,

    // Unknown key
    Unknown,
}

impl Key {
    /// Keys that move focus or activate the focused element
    pub fn is_navigation(self) -> bool {
        matches!(
            self,
            Key::Left
                | Key::Right
                | Key::Up
                | Key::Down
                | Key::Center
                | Key::PageUp
                | Key::PageDown
                | Key::Home
                | Key::End
                | Key::Tab
                | Key::Space
                | Key::Enter
        )
    }

    /// Modifier keys
    pub fn is_modifier(self) -> bool {
        matches!(self, Key::Shift | Key::Ctrl | Key::Alt | Key::Meta)
    }
}

/// Keyboard event
#[derive(Clone, Debug, PartialEq)]
pub struct KeyEvent {
    pub device_id: DeviceId,
    pub source: InputSource,
    pub action: KeyAction,
    pub key: Key,
    pub repeat_count: u32,
    pub modifiers: Modifiers,
    pub flags: KeyFlags,
    /// Time the key went down, in nanoseconds
    pub down_time: i64,
    /// Time of this event, in nanoseconds
    pub event_time: i64,
    /// Character produced by the key, if any
    pub character: Option<char>,
}

impl KeyEvent {
    /// Create a key event from the keyboard with zero times
    pub fn new(action: KeyAction, key: Key) -> Self {
        Self {
            device_id: 0,
            source: InputSource::Keyboard,
            action,
            key,
            repeat_count: 0,
            modifiers: Modifiers::default(),
            flags: KeyFlags::empty(),
            down_time: 0,
            event_time: 0,
            character: None,
        }
    }

    /// Set the device and source
    pub fn with_device(mut self, device_id: DeviceId, source: InputSource) -> Self {
        self.device_id = device_id;
        self.source = source;
        self
    }

    /// Set both the down time and the event time
    pub fn at(mut self, event_time: i64) -> Self {
        self.down_time = event_time;
        self.event_time = event_time;
        self
    }

    /// Set the modifiers
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the produced character
    pub fn with_character(mut self, character: char) -> Self {
        self.character = Some(character);
        self
    }

    /// Add flags
    pub fn with_flags(mut self, flags: KeyFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// A copy of this event with a new time and repeat count
    pub fn repeated(&self, event_time: i64, repeat_count: u32) -> Self {
        Self { event_time, repeat_count, ..self.clone() }
    }

    /// Whether the key produces printable text
    pub fn is_typing_key(&self) -> bool {
        self.character.is_some_and(|c| !c.is_control())
    }

    pub fn is_canceled(&self) -> bool {
        self.flags.contains(KeyFlags::CANCELED)
    }
}

// ============================================================================
// Motion Events
// ============================================================================

/// Motion action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionAction {
    Down,
    Up,
    Move,
    Cancel,
    Outside,
    /// A non-primary pointer went down
    PointerDown { index: usize },
    /// A non-primary pointer went up
    PointerUp { index: usize },
    HoverEnter,
    HoverMove,
    HoverExit,
    Scroll,
}

bitflags! {
    /// Per-event motion flags
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MotionFlags: u32 {
        /// The gesture was canceled
        const CANCELED = 0x0001;
        /// The window was obscured when the event was delivered
        const WINDOW_IS_OBSCURED = 0x0002;
    }
}

/// Coordinates of one pointer
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerCoords {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
}

/// A coalesced earlier sample of the primary pointer
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HistoricalSample {
    pub event_time: i64,
    pub x: f32,
    pub y: f32,
}

/// Motion event (touch, mouse, trackball, joystick)
#[derive(Clone, Debug, PartialEq)]
pub struct MotionEvent {
    pub device_id: DeviceId,
    pub source: InputSource,
    pub action: MotionAction,
    pub pointers: SmallVec<[PointerCoords; 2]>,
    /// Hat switch axes, used by joysticks
    pub hat_x: f32,
    pub hat_y: f32,
    pub modifiers: Modifiers,
    pub flags: MotionFlags,
    pub down_time: i64,
    pub event_time: i64,
    /// Earlier samples folded into this event, oldest first
    pub history: SmallVec<[HistoricalSample; 4]>,
    raw_x: f32,
    raw_y: f32,
}

impl MotionEvent {
    /// Create a single-pointer motion event
    pub fn new(source: InputSource, action: MotionAction, x: f32, y: f32) -> Self {
        let mut pointers = SmallVec::new();
        pointers.push(PointerCoords { id: 0, x, y, pressure: 1.0 });
        Self {
            device_id: 0,
            source,
            action,
            pointers,
            hat_x: 0.0,
            hat_y: 0.0,
            modifiers: Modifiers::default(),
            flags: MotionFlags::empty(),
            down_time: 0,
            event_time: 0,
            history: SmallVec::new(),
            raw_x: x,
            raw_y: y,
        }
    }

    /// Set the device id
    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = device_id;
        self
    }

    /// Set both the down time and the event time
    pub fn at(mut self, event_time: i64) -> Self {
        self.down_time = event_time;
        self.event_time = event_time;
        self
    }

    /// Set the hat switch axes
    pub fn with_hat(mut self, hat_x: f32, hat_y: f32) -> Self {
        self.hat_x = hat_x;
        self.hat_y = hat_y;
        self
    }

    /// X of the primary pointer
    pub fn x(&self) -> f32 {
        self.pointers.first().map_or(0.0, |p| p.x)
    }

    /// Y of the primary pointer
    pub fn y(&self) -> f32 {
        self.pointers.first().map_or(0.0, |p| p.y)
    }

    /// X of the primary pointer, unaffected by offsets and scaling
    pub fn raw_x(&self) -> f32 {
        self.raw_x
    }

    /// Y of the primary pointer, unaffected by offsets and scaling
    pub fn raw_y(&self) -> f32 {
        self.raw_y
    }

    /// Time of the oldest sample carried by this event
    pub fn oldest_event_time(&self) -> i64 {
        self.history.first().map_or(self.event_time, |h| h.event_time)
    }

    /// Shift all pointer coordinates
    pub fn offset_location(&mut self, dx: f32, dy: f32) {
        for pointer in &mut self.pointers {
            pointer.x += dx;
            pointer.y += dy;
        }
        for sample in &mut self.history {
            sample.x += dx;
            sample.y += dy;
        }
    }

    /// Scale all pointer coordinates
    pub fn scale(&mut self, factor: f32) {
        for pointer in &mut self.pointers {
            pointer.x *= factor;
            pointer.y *= factor;
        }
        for sample in &mut self.history {
            sample.x *= factor;
            sample.y *= factor;
        }
    }

    /// Fold `next` into this event, keeping this event's position as history
    pub fn add_batch(&mut self, next: &MotionEvent) {
        self.history.push(HistoricalSample {
            event_time: self.event_time,
            x: self.x(),
            y: self.y(),
        });
        self.history.extend(next.history.iter().copied());
        self.pointers = next.pointers.clone();
        self.event_time = next.event_time;
        self.raw_x = next.raw_x;
        self.raw_y = next.raw_y;
    }

    /// Whether this is a touch gesture event from a pointer source
    pub fn is_touch_event(&self) -> bool {
        self.source.is_class(SourceClass::POINTER)
            && matches!(
                self.action,
                MotionAction::Down
                    | MotionAction::Up
                    | MotionAction::Move
                    | MotionAction::Cancel
                    | MotionAction::Outside
                    | MotionAction::PointerDown { .. }
                    | MotionAction::PointerUp { .. }
            )
    }
}

// ============================================================================
// Input Events
// ============================================================================

/// Input events
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Motion(MotionEvent),
}

impl InputEvent {
    pub fn device_id(&self) -> DeviceId {
        match self {
            InputEvent::Key(key) => key.device_id,
            InputEvent::Motion(motion) => motion.device_id,
        }
    }

    pub fn source(&self) -> InputSource {
        match self {
            InputEvent::Key(key) => key.source,
            InputEvent::Motion(motion) => motion.source,
        }
    }

    /// Time of the newest sample, in nanoseconds
    pub fn event_time(&self) -> i64 {
        match self {
            InputEvent::Key(key) => key.event_time,
            InputEvent::Motion(motion) => motion.event_time,
        }
    }

    /// Time of the oldest sample, in nanoseconds
    pub fn oldest_event_time(&self) -> i64 {
        match self {
            InputEvent::Key(key) => key.event_time,
            InputEvent::Motion(motion) => motion.oldest_event_time(),
        }
    }

    pub fn is_from_class(&self, class: SourceClass) -> bool {
        self.source().is_class(class)
    }

    /// Whether the event ends a gesture or a key press
    pub fn is_terminal(&self) -> bool {
        match self {
            InputEvent::Key(key) => key.action == KeyAction::Up,
            InputEvent::Motion(motion) => matches!(
                motion.action,
                MotionAction::Up | MotionAction::Cancel | MotionAction::HoverExit
            ),
        }
    }

    /// Mark the event canceled
    pub fn cancel(&mut self) {
        match self {
            InputEvent::Key(key) => key.flags |= KeyFlags::CANCELED,
            InputEvent::Motion(motion) => {
                motion.flags |= MotionFlags::CANCELED;
                if motion.action != MotionAction::HoverExit {
                    motion.action = MotionAction::Cancel;
                }
            }
        }
    }

    pub fn is_canceled(&self) -> bool {
        match self {
            InputEvent::Key(key) => key.is_canceled(),
            InputEvent::Motion(motion) => {
                motion.flags.contains(MotionFlags::CANCELED)
                    || motion.action == MotionAction::Cancel
            }
        }
    }

    pub fn as_key(&self) -> Option<&KeyEvent> {
        match self {
            InputEvent::Key(key) => Some(key),
            InputEvent::Motion(_) => None,
        }
    }

    pub fn as_motion(&self) -> Option<&MotionEvent> {
        match self {
            InputEvent::Motion(motion) => Some(motion),
            InputEvent::Key(_) => None,
        }
    }
}

impl From<KeyEvent> for InputEvent {
    fn from(event: KeyEvent) -> Self {
        InputEvent::Key(event)
    }
}

impl From<MotionEvent> for InputEvent {
    fn from(event: MotionEvent) -> Self {
        InputEvent::Motion(event)
    }
}

// ============================================================================
// Devices
// ============================================================================

/// Motion axes with a reported range
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

/// Range of a device axis
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionRange {
    pub min: f32,
    pub max: f32,
    /// Units per millimeter, zero when unknown
    pub resolution: f32,
}

impl MotionRange {
    pub fn range(&self) -> f32 {
        self.max - self.min
    }
}

/// Registry of attached input devices
pub trait InputDevices: Send + Sync {
    /// The range of `axis` for a device, if the device reports one
    fn motion_range(&self, device_id: DeviceId, axis: Axis, source: InputSource) -> Option<MotionRange>;
}

/// Devices that report no ranges
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInputDevices;

impl InputDevices for NoInputDevices {
    fn motion_range(&self, _device_id: DeviceId, _axis: Axis, _source: InputSource) -> Option<MotionRange> {
        None
    }
}
