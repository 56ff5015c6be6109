//! Synthetic user input for the headless backend.

use log::info;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sdlbound_core::event::{
    ActiveEvent, AppState, ButtonState, Key, KeyboardEvent, Keysym, Mod, MouseButton,
    MouseButtonEvent, MouseMotionEvent, ResizeEvent,
};
use sdlbound_core::{Event, HeadlessNative};

use crate::signals::StopSignal;

fn key(sym: Key, unicode: u16, state: ButtonState) -> Event {
    Event::Keyboard(KeyboardEvent {
        which: 0,
        state,
        keysym: Keysym {
            scancode: 0,
            sym,
            modifiers: Mod::empty(),
            unicode,
        },
    })
}

fn motion(x: u16, y: u16, xrel: i16, yrel: i16) -> Event {
    Event::MouseMotion(MouseMotionEvent {
        which: 0,
        buttons: 0,
        x,
        y,
        xrel,
        yrel,
    })
}

fn click(x: u16, y: u16) -> Event {
    Event::MouseButton(MouseButtonEvent {
        which: 0,
        button: MouseButton::Left,
        state: ButtonState::Pressed,
        x,
        y,
    })
}

/// Feed a fixed session: focus, a mouse sweep with clicks, a window resize, then Escape.
pub fn spawn(native: Arc<HeadlessNative>, stop: StopSignal) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("sdltest-script".to_string()).spawn(move || {
        let step = Duration::from_millis(16);
        let push = |ev: Event| {
            native.push_event(&ev);
            thread::sleep(step);
        };

        push(Event::Active(ActiveEvent {
            gain: true,
            state: AppState::ACTIVE | AppState::INPUTFOCUS,
        }));

        let (mut x, mut y) = (0u16, 0u16);
        for i in 0..120u16 {
            if stop.is_requested() {
                return;
            }
            let (nx, ny) = (20 + i * 4, 40 + (i % 60) * 6);
            push(motion(nx, ny, nx as i16 - x as i16, ny as i16 - y as i16));
            (x, y) = (nx, ny);
            if i % 40 == 39 {
                push(click(x, y));
            }
        }

        push(key(Key::KP_PLUS, u16::from(b'+'), ButtonState::Pressed));
        push(key(Key::KP_PLUS, 0, ButtonState::Released));
        push(Event::Resize(ResizeEvent { w: 800, h: 600 }));

        for i in 0..60u16 {
            if stop.is_requested() {
                return;
            }
            push(motion(700 - i * 8, 500 - i * 6, -8, -6));
        }

        info!(target: "sdl", "script.done");
        push(key(Key::ESCAPE, 27, ButtonState::Pressed));
    })
}
