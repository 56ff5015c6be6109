use bytemuck::{Pod, Zeroable};

use super::{
    ActiveEvent, AppState, ButtonState, Event, Hat, JoyAxisEvent, JoyBallEvent, JoyButtonEvent,
    JoyHatEvent, Key, KeyboardEvent, Keysym, Mod, MouseButton, MouseButtonEvent,
    MouseMotionEvent, ResizeEvent,
};

/// Size of one native event record (`SDL_Event` on 64-bit targets).
pub const RAW_EVENT_SIZE: usize = 24;

/// Native discriminant values (first byte of every record).
pub mod kind {
    pub const NOEVENT: u8 = 0;
    pub const ACTIVEEVENT: u8 = 1;
    pub const KEYDOWN: u8 = 2;
    pub const KEYUP: u8 = 3;
    pub const MOUSEMOTION: u8 = 4;
    pub const MOUSEBUTTONDOWN: u8 = 5;
    pub const MOUSEBUTTONUP: u8 = 6;
    pub const JOYAXISMOTION: u8 = 7;
    pub const JOYBALLMOTION: u8 = 8;
    pub const JOYHATMOTION: u8 = 9;
    pub const JOYBUTTONDOWN: u8 = 10;
    pub const JOYBUTTONUP: u8 = 11;
    pub const QUIT: u8 = 12;
    pub const SYSWMEVENT: u8 = 13;
    pub const VIDEORESIZE: u8 = 16;
    pub const VIDEOEXPOSE: u8 = 17;
    pub const USEREVENT: u8 = 24;
}

// Field offsets inside the record, per member struct. Native endian.
const OFF_WHICH: usize = 1;
const OFF_B2: usize = 2;
const OFF_B3: usize = 3;
const OFF_KEY_SCANCODE: usize = 4;
const OFF_KEY_SYM: usize = 8;
const OFF_KEY_MOD: usize = 12;
const OFF_KEY_UNICODE: usize = 16;
const OFF_W4: usize = 4;
const OFF_W6: usize = 6;
const OFF_W8: usize = 8;
const OFF_W10: usize = 10;
const OFF_RESIZE_W: usize = 4;
const OFF_RESIZE_H: usize = 8;

/// Fixed-size native event record, copied verbatim out of the native poll call.
///
/// Never reinterpreted as a typed struct: [`decode`](Self::decode) reads the discriminant
/// and then only the fields that are valid for that kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RawEvent {
    bytes: [u8; RAW_EVENT_SIZE],
}

impl Default for RawEvent {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl RawEvent {
    #[inline]
    pub fn from_bytes(bytes: [u8; RAW_EVENT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Copy a record out of a native buffer. `None` if the buffer is too short.
    pub fn from_slice(buf: &[u8]) -> Option<Self> {
        let head = buf.get(..RAW_EVENT_SIZE)?;
        bytemuck::try_pod_read_unaligned(head).ok()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; RAW_EVENT_SIZE] {
        &self.bytes
    }

    #[inline]
    pub fn discriminant(&self) -> u8 {
        self.bytes[0]
    }

    #[inline]
    fn u8_at(&self, off: usize) -> u8 {
        self.bytes[off]
    }

    #[inline]
    fn u16_at(&self, off: usize) -> u16 {
        bytemuck::pod_read_unaligned(&self.bytes[off..off + 2])
    }

    #[inline]
    fn i16_at(&self, off: usize) -> i16 {
        bytemuck::pod_read_unaligned(&self.bytes[off..off + 2])
    }

    #[inline]
    fn u32_at(&self, off: usize) -> u32 {
        bytemuck::pod_read_unaligned(&self.bytes[off..off + 4])
    }

    #[inline]
    fn i32_at(&self, off: usize) -> i32 {
        bytemuck::pod_read_unaligned(&self.bytes[off..off + 4])
    }

    #[inline]
    fn put(&mut self, off: usize, src: &[u8]) {
        self.bytes[off..off + src.len()].copy_from_slice(src);
    }

    /// Decode into a tagged variant. Unsupported discriminants yield `None`.
    pub fn decode(&self) -> Option<Event> {
        let which = self.u8_at(OFF_WHICH);

        let ev = match self.discriminant() {
            kind::QUIT => Event::Quit,
            k @ (kind::KEYDOWN | kind::KEYUP) => Event::Keyboard(KeyboardEvent {
                which,
                state: state_for(k == kind::KEYDOWN),
                keysym: Keysym {
                    scancode: self.u8_at(OFF_KEY_SCANCODE),
                    sym: Key(self.u32_at(OFF_KEY_SYM)),
                    modifiers: Mod::from_bits_retain(self.u32_at(OFF_KEY_MOD) as u16),
                    unicode: self.u16_at(OFF_KEY_UNICODE),
                },
            }),
            k @ (kind::MOUSEBUTTONDOWN | kind::MOUSEBUTTONUP) => {
                Event::MouseButton(MouseButtonEvent {
                    which,
                    button: MouseButton::from_index(self.u8_at(OFF_B2)),
                    state: state_for(k == kind::MOUSEBUTTONDOWN),
                    x: self.u16_at(OFF_W4),
                    y: self.u16_at(OFF_W6),
                })
            }
            kind::MOUSEMOTION => Event::MouseMotion(MouseMotionEvent {
                which,
                buttons: self.u8_at(OFF_B2),
                x: self.u16_at(OFF_W4),
                y: self.u16_at(OFF_W6),
                xrel: self.i16_at(OFF_W8),
                yrel: self.i16_at(OFF_W10),
            }),
            kind::ACTIVEEVENT => Event::Active(ActiveEvent {
                gain: self.u8_at(OFF_WHICH) != 0,
                state: AppState::from_bits_retain(self.u8_at(OFF_B2)),
            }),
            kind::VIDEORESIZE => Event::Resize(ResizeEvent {
                w: self.i32_at(OFF_RESIZE_W),
                h: self.i32_at(OFF_RESIZE_H),
            }),
            kind::JOYAXISMOTION => Event::JoyAxis(JoyAxisEvent {
                which,
                axis: self.u8_at(OFF_B2),
                value: self.i16_at(OFF_W4),
            }),
            k @ (kind::JOYBUTTONDOWN | kind::JOYBUTTONUP) => Event::JoyButton(JoyButtonEvent {
                which,
                button: self.u8_at(OFF_B2),
                state: state_for(k == kind::JOYBUTTONDOWN),
            }),
            kind::JOYHATMOTION => Event::JoyHat(JoyHatEvent {
                which,
                hat: self.u8_at(OFF_B2),
                value: Hat::from_bits_retain(self.u8_at(OFF_B3)),
            }),
            kind::JOYBALLMOTION => Event::JoyBall(JoyBallEvent {
                which,
                ball: self.u8_at(OFF_B2),
                xrel: self.i16_at(OFF_W4),
                yrel: self.i16_at(OFF_W6),
            }),
            _ => return None,
        };

        Some(ev)
    }
}

#[inline]
fn state_for(pressed: bool) -> ButtonState {
    if pressed {
        ButtonState::Pressed
    } else {
        ButtonState::Released
    }
}

#[inline]
fn state_byte(state: ButtonState) -> u8 {
    match state {
        ButtonState::Pressed => 1,
        ButtonState::Released => 0,
    }
}

/// Lay an event out as the native layer would. Used by in-memory native layers.
impl From<&Event> for RawEvent {
    fn from(ev: &Event) -> Self {
        let mut raw = RawEvent::zeroed();

        match *ev {
            Event::Quit => raw.bytes[0] = kind::QUIT,
            Event::Keyboard(k) => {
                raw.bytes[0] = if k.state.is_pressed() { kind::KEYDOWN } else { kind::KEYUP };
                raw.bytes[OFF_WHICH] = k.which;
                raw.bytes[OFF_B2] = state_byte(k.state);
                raw.bytes[OFF_KEY_SCANCODE] = k.keysym.scancode;
                raw.put(OFF_KEY_SYM, &k.keysym.sym.0.to_ne_bytes());
                raw.put(OFF_KEY_MOD, &u32::from(k.keysym.modifiers.bits()).to_ne_bytes());
                raw.put(OFF_KEY_UNICODE, &k.keysym.unicode.to_ne_bytes());
            }
            Event::MouseButton(b) => {
                raw.bytes[0] = if b.state.is_pressed() {
                    kind::MOUSEBUTTONDOWN
                } else {
                    kind::MOUSEBUTTONUP
                };
                raw.bytes[OFF_WHICH] = b.which;
                raw.bytes[OFF_B2] = b.button.index();
                raw.bytes[OFF_B3] = state_byte(b.state);
                raw.put(OFF_W4, &b.x.to_ne_bytes());
                raw.put(OFF_W6, &b.y.to_ne_bytes());
            }
            Event::MouseMotion(m) => {
                raw.bytes[0] = kind::MOUSEMOTION;
                raw.bytes[OFF_WHICH] = m.which;
                raw.bytes[OFF_B2] = m.buttons;
                raw.put(OFF_W4, &m.x.to_ne_bytes());
                raw.put(OFF_W6, &m.y.to_ne_bytes());
                raw.put(OFF_W8, &m.xrel.to_ne_bytes());
                raw.put(OFF_W10, &m.yrel.to_ne_bytes());
            }
            Event::Active(a) => {
                raw.bytes[0] = kind::ACTIVEEVENT;
                raw.bytes[OFF_WHICH] = u8::from(a.gain);
                raw.bytes[OFF_B2] = a.state.bits();
            }
            Event::Resize(r) => {
                raw.bytes[0] = kind::VIDEORESIZE;
                raw.put(OFF_RESIZE_W, &r.w.to_ne_bytes());
                raw.put(OFF_RESIZE_H, &r.h.to_ne_bytes());
            }
            Event::JoyAxis(j) => {
                raw.bytes[0] = kind::JOYAXISMOTION;
                raw.bytes[OFF_WHICH] = j.which;
                raw.bytes[OFF_B2] = j.axis;
                raw.put(OFF_W4, &j.value.to_ne_bytes());
            }
            Event::JoyButton(j) => {
                raw.bytes[0] = if j.state.is_pressed() {
                    kind::JOYBUTTONDOWN
                } else {
                    kind::JOYBUTTONUP
                };
                raw.bytes[OFF_WHICH] = j.which;
                raw.bytes[OFF_B2] = j.button;
                raw.bytes[OFF_B3] = state_byte(j.state);
            }
            Event::JoyHat(j) => {
                raw.bytes[0] = kind::JOYHATMOTION;
                raw.bytes[OFF_WHICH] = j.which;
                raw.bytes[OFF_B2] = j.hat;
                raw.bytes[OFF_B3] = j.value.bits();
            }
            Event::JoyBall(j) => {
                raw.bytes[0] = kind::JOYBALLMOTION;
                raw.bytes[OFF_WHICH] = j.which;
                raw.bytes[OFF_B2] = j.ball;
                raw.put(OFF_W4, &j.xrel.to_ne_bytes());
                raw.put(OFF_W6, &j.yrel.to_ne_bytes());
            }
        }

        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u8) -> [u8; RAW_EVENT_SIZE] {
        let mut b = [0u8; RAW_EVENT_SIZE];
        b[0] = kind;
        b
    }

    #[test]
    fn decodes_key_down_from_native_layout() {
        let mut b = record(kind::KEYDOWN);
        b[1] = 0; // which
        b[2] = 1; // SDL_PRESSED
        b[4] = 9; // scancode
        b[8..12].copy_from_slice(&27u32.to_ne_bytes());
        b[12..16].copy_from_slice(&(0x0041u32).to_ne_bytes());
        b[16..18].copy_from_slice(&27u16.to_ne_bytes());

        let ev = RawEvent::from_bytes(b).decode().unwrap();
        let Event::Keyboard(k) = ev else {
            panic!("expected keyboard, got {ev:?}");
        };
        assert_eq!(k.state, ButtonState::Pressed);
        assert_eq!(k.keysym.scancode, 9);
        assert_eq!(k.keysym.sym, Key::ESCAPE);
        assert_eq!(k.keysym.modifiers, Mod::LSHIFT | Mod::LCTRL);
        assert_eq!(k.keysym.char(), Some('\u{1b}'));
    }

    #[test]
    fn key_up_state_follows_discriminant() {
        let ev = RawEvent::from_bytes(record(kind::KEYUP)).decode().unwrap();
        let Event::Keyboard(k) = ev else {
            panic!("expected keyboard");
        };
        assert_eq!(k.state, ButtonState::Released);
        assert_eq!(k.keysym.char(), None);
    }

    #[test]
    fn decodes_negative_relative_motion() {
        let mut b = record(kind::MOUSEMOTION);
        b[2] = 0b101;
        b[4..6].copy_from_slice(&320u16.to_ne_bytes());
        b[6..8].copy_from_slice(&200u16.to_ne_bytes());
        b[8..10].copy_from_slice(&(-3i16).to_ne_bytes());
        b[10..12].copy_from_slice(&(7i16).to_ne_bytes());

        let ev = RawEvent::from_bytes(b).decode().unwrap();
        assert_eq!(
            ev,
            Event::MouseMotion(MouseMotionEvent {
                which: 0,
                buttons: 0b101,
                x: 320,
                y: 200,
                xrel: -3,
                yrel: 7,
            })
        );
    }

    #[test]
    fn decodes_resize_dimensions() {
        let mut b = record(kind::VIDEORESIZE);
        b[4..8].copy_from_slice(&800i32.to_ne_bytes());
        b[8..12].copy_from_slice(&600i32.to_ne_bytes());

        let ev = RawEvent::from_bytes(b).decode().unwrap();
        assert_eq!(ev, Event::Resize(ResizeEvent { w: 800, h: 600 }));
    }

    #[test]
    fn decodes_joystick_hat() {
        let mut b = record(kind::JOYHATMOTION);
        b[1] = 1;
        b[2] = 0;
        b[3] = 0x01 | 0x02;

        let ev = RawEvent::from_bytes(b).decode().unwrap();
        assert_eq!(
            ev,
            Event::JoyHat(JoyHatEvent {
                which: 1,
                hat: 0,
                value: Hat::UP | Hat::RIGHT,
            })
        );
    }

    #[test]
    fn unsupported_discriminants_are_not_decoded() {
        for k in [
            kind::NOEVENT,
            kind::SYSWMEVENT,
            kind::VIDEOEXPOSE,
            kind::USEREVENT,
            200,
        ] {
            assert_eq!(RawEvent::from_bytes(record(k)).decode(), None, "kind {k}");
        }
    }

    #[test]
    fn fields_of_other_kinds_do_not_leak() {
        // Garbage in the keysym area must not show up in a joystick button event.
        let mut b = [0xAAu8; RAW_EVENT_SIZE];
        b[0] = kind::JOYBUTTONDOWN;
        b[1] = 2;
        b[2] = 5;

        let ev = RawEvent::from_bytes(b).decode().unwrap();
        assert_eq!(
            ev,
            Event::JoyButton(JoyButtonEvent {
                which: 2,
                button: 5,
                state: ButtonState::Pressed,
            })
        );
    }

    #[test]
    fn from_slice_requires_a_full_record() {
        assert!(RawEvent::from_slice(&[kind::QUIT; 8]).is_none());

        let mut buf = vec![0u8; RAW_EVENT_SIZE + 4];
        buf[0] = kind::QUIT;
        let raw = RawEvent::from_slice(&buf).unwrap();
        assert_eq!(raw.decode(), Some(Event::Quit));
    }

    #[test]
    fn layout_written_for_mouse_button_matches_native_offsets() {
        let raw = RawEvent::from(&Event::MouseButton(MouseButtonEvent {
            which: 0,
            button: MouseButton::Right,
            state: ButtonState::Pressed,
            x: 10,
            y: 20,
        }));
        let b = raw.as_bytes();
        assert_eq!(b[0], kind::MOUSEBUTTONDOWN);
        assert_eq!(b[2], 3);
        assert_eq!(b[3], 1);
        assert_eq!(u16::from_ne_bytes([b[4], b[5]]), 10);
        assert_eq!(u16::from_ne_bytes([b[6], b[7]]), 20);
    }
}
