//! Decoded, strongly-typed native events.
//!
//! Every value is an immutable snapshot copied out of a native record at poll time.

mod raw;

pub use raw::{kind, RawEvent, RAW_EVENT_SIZE};

use bitflags::bitflags;

/// Virtual key code (`SDLKey`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Key(pub u32);

impl Key {
    pub const BACKSPACE: Key = Key(8);
    pub const TAB: Key = Key(9);
    pub const RETURN: Key = Key(13);
    pub const ESCAPE: Key = Key(27);
    pub const SPACE: Key = Key(32);
    pub const KP_PLUS: Key = Key(270);
    pub const UP: Key = Key(273);
    pub const DOWN: Key = Key(274);
    pub const RIGHT: Key = Key(275);
    pub const LEFT: Key = Key(276);
}

bitflags! {
    /// Modifier key mask (`SDLMod`).
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct Mod: u16 {
        const LSHIFT = 0x0001;
        const RSHIFT = 0x0002;
        const LCTRL = 0x0040;
        const RCTRL = 0x0080;
        const LALT = 0x0100;
        const RALT = 0x0200;
        const LMETA = 0x0400;
        const RMETA = 0x0800;
        const NUM = 0x1000;
        const CAPS = 0x2000;
        const MODE = 0x4000;

        const SHIFT = Self::LSHIFT.bits() | Self::RSHIFT.bits();
        const CTRL = Self::LCTRL.bits() | Self::RCTRL.bits();
        const ALT = Self::LALT.bits() | Self::RALT.bits();
        const META = Self::LMETA.bits() | Self::RMETA.bits();
    }
}

bitflags! {
    /// Which kind of focus an [`ActiveEvent`] refers to.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct AppState: u8 {
        const MOUSEFOCUS = 0x01;
        const INPUTFOCUS = 0x02;
        const ACTIVE = 0x04;
    }
}

bitflags! {
    /// Joystick hat position. Empty means centered.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct Hat: u8 {
        const UP = 0x01;
        const RIGHT = 0x02;
        const DOWN = 0x04;
        const LEFT = 0x08;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ButtonState {
    Pressed,
    Released,
}

impl ButtonState {
    #[inline]
    pub fn is_pressed(self) -> bool {
        self == ButtonState::Pressed
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    Other(u8),
}

impl MouseButton {
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => MouseButton::Left,
            2 => MouseButton::Middle,
            3 => MouseButton::Right,
            4 => MouseButton::WheelUp,
            5 => MouseButton::WheelDown,
            n => MouseButton::Other(n),
        }
    }

    pub fn index(self) -> u8 {
        match self {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
            MouseButton::WheelUp => 4,
            MouseButton::WheelDown => 5,
            MouseButton::Other(n) => n,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Keysym {
    pub scancode: u8,
    pub sym: Key,
    pub modifiers: Mod,
    /// UTF-16 code unit, 0 when unicode translation is off.
    pub unicode: u16,
}

impl Keysym {
    /// Translated character, when there is one.
    pub fn char(&self) -> Option<char> {
        match self.unicode {
            0 => None,
            u => char::from_u32(u32::from(u)),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct KeyboardEvent {
    pub which: u8,
    pub state: ButtonState,
    pub keysym: Keysym,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MouseButtonEvent {
    pub which: u8,
    pub button: MouseButton,
    pub state: ButtonState,
    pub x: u16,
    pub y: u16,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MouseMotionEvent {
    pub which: u8,
    /// Mask of held buttons, bit `n - 1` for button index `n`.
    pub buttons: u8,
    pub x: u16,
    pub y: u16,
    pub xrel: i16,
    pub yrel: i16,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ActiveEvent {
    pub gain: bool,
    pub state: AppState,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ResizeEvent {
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct JoyAxisEvent {
    pub which: u8,
    pub axis: u8,
    pub value: i16,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct JoyButtonEvent {
    pub which: u8,
    pub button: u8,
    pub state: ButtonState,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct JoyHatEvent {
    pub which: u8,
    pub hat: u8,
    pub value: Hat,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct JoyBallEvent {
    pub which: u8,
    pub ball: u8,
    pub xrel: i16,
    pub yrel: i16,
}

/// One native event, keyed by its discriminant.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Event {
    Quit,
    Keyboard(KeyboardEvent),
    MouseButton(MouseButtonEvent),
    MouseMotion(MouseMotionEvent),
    Active(ActiveEvent),
    Resize(ResizeEvent),
    JoyAxis(JoyAxisEvent),
    JoyButton(JoyButtonEvent),
    JoyHat(JoyHatEvent),
    JoyBall(JoyBallEvent),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Quit => "quit",
            Event::Keyboard(_) => "keyboard",
            Event::MouseButton(_) => "mouse_button",
            Event::MouseMotion(_) => "mouse_motion",
            Event::Active(_) => "active",
            Event::Resize(_) => "resize",
            Event::JoyAxis(_) => "joy_axis",
            Event::JoyButton(_) => "joy_button",
            Event::JoyHat(_) => "joy_hat",
            Event::JoyBall(_) => "joy_ball",
        }
    }
}
