//! Keyboard and mouse state queries.
//!
//! The native side updates this state while it pumps events, so every query is a
//! library-global call: it runs on the owner thread under the global lock.

use crate::context::Sdl;
use crate::error::{SdlError, SdlResult};
use crate::event::{Key, Mod, MouseButton};

/// Number of virtual key codes (`SDLK_LAST`).
pub const KEY_COUNT: usize = 323;

/// Key repeat timing in milliseconds. A zero delay disables repeat.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct KeyRepeat {
    pub delay: i32,
    pub interval: i32,
}

impl KeyRepeat {
    pub const DEFAULT: KeyRepeat = KeyRepeat {
        delay: 500,
        interval: 30,
    };
}

/// Snapshot of which keys were held when it was taken. Owned; later input does not change it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct KeyState(Vec<u8>);

impl KeyState {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn is_pressed(&self, key: Key) -> bool {
        self.0.get(key.0 as usize).is_some_and(|&b| b != 0)
    }

    pub fn pressed(&self) -> impl Iterator<Item = Key> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b != 0)
            .map(|(i, _)| Key(i as u32))
    }
}

/// Pointer position (absolute or relative) and held buttons.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct MouseState {
    pub x: i32,
    pub y: i32,
    /// Bit `n - 1` for button index `n`.
    pub buttons: u8,
}

impl MouseState {
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        match button.index() {
            n @ 1..=8 => self.buttons & (1 << (n - 1)) != 0,
            _ => false,
        }
    }
}

const QUERY: i32 = -1;

impl Sdl {
    /// Turn unicode translation of key presses on or off. Returns the previous setting.
    ///
    /// While off, the `unicode` field of keyboard events is 0.
    pub fn enable_unicode(&self, enable: bool) -> SdlResult<bool> {
        let toggle = i32::from(enable);
        self.global(move |native, _| native.enable_unicode(toggle) == 1)
    }

    pub fn unicode_enabled(&self) -> SdlResult<bool> {
        self.global(|native, _| native.enable_unicode(QUERY) == 1)
    }

    pub fn enable_key_repeat(&self, repeat: KeyRepeat) -> SdlResult<()> {
        self.global(move |native, _| {
            match native.enable_key_repeat(repeat.delay, repeat.interval) {
                0 => Ok(()),
                code => Err((code, native.error())),
            }
        })?
        .map_err(|(code, message)| SdlError::Native {
            op: "enable_key_repeat",
            code,
            message,
        })
    }

    pub fn key_repeat(&self) -> SdlResult<KeyRepeat> {
        self.global(|native, _| {
            let (delay, interval) = native.key_repeat();
            KeyRepeat { delay, interval }
        })
    }

    pub fn key_state(&self) -> SdlResult<KeyState> {
        self.global(|native, _| KeyState::from_bytes(native.key_state()))
    }

    pub fn mod_state(&self) -> SdlResult<Mod> {
        self.global(|native, _| native.mod_state())
    }

    pub fn set_mod_state(&self, modstate: Mod) -> SdlResult<()> {
        self.global(move |native, _| native.set_mod_state(modstate))
    }

    /// Human-readable name of a virtual key, e.g. `"[+]"` for the keypad plus.
    pub fn key_name(&self, key: Key) -> SdlResult<String> {
        self.global(move |native, _| native.key_name(key))
    }

    pub fn mouse_state(&self) -> SdlResult<MouseState> {
        self.global(|native, _| {
            let (x, y, buttons) = native.mouse_state();
            MouseState { x, y, buttons }
        })
    }

    /// Motion accumulated since the previous call (or since init).
    pub fn relative_mouse_state(&self) -> SdlResult<MouseState> {
        self.global(|native, _| {
            let (x, y, buttons) = native.relative_mouse_state();
            MouseState { x, y, buttons }
        })
    }

    /// Show or hide the cursor. Returns whether it was shown before.
    pub fn show_cursor(&self, show: bool) -> SdlResult<bool> {
        let toggle = i32::from(show);
        self.global(move |native, _| native.show_cursor(toggle) == 1)
    }

    pub fn cursor_shown(&self) -> SdlResult<bool> {
        self.global(|native, _| native.show_cursor(QUERY) == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_state_reports_held_keys() {
        let mut bytes = vec![0u8; KEY_COUNT];
        bytes[Key::ESCAPE.0 as usize] = 1;
        bytes[Key::LEFT.0 as usize] = 1;
        let state = KeyState::from_bytes(bytes);

        assert!(state.is_pressed(Key::ESCAPE));
        assert!(!state.is_pressed(Key::SPACE));
        assert!(!state.is_pressed(Key(10_000)));
        assert_eq!(state.pressed().collect::<Vec<_>>(), vec![Key::ESCAPE, Key::LEFT]);
    }

    #[test]
    fn mouse_buttons_map_to_mask_bits() {
        let m = MouseState {
            x: 0,
            y: 0,
            buttons: 0b101,
        };
        assert!(m.is_pressed(MouseButton::Left));
        assert!(!m.is_pressed(MouseButton::Middle));
        assert!(m.is_pressed(MouseButton::Right));
        assert!(!m.is_pressed(MouseButton::Other(12)));
    }
}
