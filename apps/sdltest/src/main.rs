mod script;
mod signals;

use anyhow::Context;
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender, TrySendError};
use log::{info, warn};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sdlbound_core::event::{ButtonState, Key};
use sdlbound_core::native::PixelMasks;
use sdlbound_core::{
    Event, HeadlessNative, InitFlags, KeyRepeat, Rect, Sdl, SdlConfig, Surface, ThreadBound,
    VideoFlags,
};

use crate::signals::StopSignal;

const DEFAULT_CONFIG: &str = "sdltest.toml";
const IMAGE_SIZE: u16 = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

impl Point {
    fn sub(self, o: Point) -> Point {
        Point { x: self.x - o.x, y: self.y - o.y }
    }

    fn add(self, o: Point) -> Point {
        Point { x: self.x + o.x, y: self.y + o.y }
    }

    fn scale(self, f: f64) -> Point {
        Point {
            x: (f64::from(self.x) * f) as i32,
            y: (f64::from(self.y) * f) as i32,
        }
    }

    fn length(self) -> f64 {
        f64::from(self.x * self.x + self.y * self.y).sqrt()
    }
}

/// One segment: trails whatever it receives and reports its own position.
fn spawn_worm(input: Receiver<Point>, out: Sender<Point>, draw: Sender<Point>) {
    thread::spawn(move || {
        let mut at = Point::default();
        for target in input.iter() {
            let d = target.sub(at);
            if d.length() > 24.0 {
                at = at.add(d.scale(0.1));
            }
            if draw.send(at).is_err() || out.send(at).is_err() {
                break;
            }
        }
    });
}

fn build_image(sdl: &Sdl) -> anyhow::Result<Surface> {
    let (w, h) = (IMAGE_SIZE, IMAGE_SIZE);
    let masks = PixelMasks {
        r: 0xff00_0000,
        g: 0x00ff_0000,
        b: 0x0000_ff00,
        a: 0x0000_00ff,
    };
    let image = sdl
        .video()
        .create_rgb_surface(VideoFlags::SWSURFACE, i32::from(w), i32::from(h), 32, masks)?;
    image.fill_rect(Some(Rect::new(0, 0, w, h)), 0xff00_ff33)?;
    image.fill_rect(Some(Rect::new(8, 8, w - 16, h - 16)), 0xff00_ff55)?;
    image.fill_rect(Some(Rect::new(16, 16, w - 32, h - 32)), 0xff00_ff77)?;
    Ok(image)
}

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = SdlConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {config_path}"))?;
    sdlbound_modules_logging::init(&config.logging);

    let stop = StopSignal::with_ctrl_c()?;

    let bound = ThreadBound::with_policy(config.unbound);
    let owner = bound.spawn_owner(&config.owner_thread_name)?;

    let native = Arc::new(HeadlessNative::new());
    let sdl = Sdl::new(config, native.clone(), bound)?;
    info!(target: "sdl", "version {}", sdl.version());

    sdl.init(InitFlags::EVERYTHING).context("init")?;
    info!(target: "sdl", "init ok subsystems={:?}", sdl.was_init(InitFlags::EVERYTHING)?);

    let mut screen = sdl
        .video()
        .set_video_mode(640, 480, 32, VideoFlags::RESIZABLE)
        .context("set_video_mode")?;
    info!(
        target: "video",
        "mode ok size={:?} best_bpp={}",
        screen.size()?,
        sdl.video().video_mode_ok(640, 480, 32, VideoFlags::RESIZABLE)?
    );

    sdl.enable_unicode(true)?;
    sdl.enable_key_repeat(KeyRepeat::DEFAULT)?;
    let plus = sdl.key_name(Key::KP_PLUS)?;
    if plus != "[+]" {
        anyhow::bail!("key_name broken: {plus:?}");
    }
    info!(target: "sdl", "input ok unicode={} repeat={:?}", sdl.unicode_enabled()?, sdl.key_repeat()?);

    let image = build_image(&sdl)?;

    let script = script::spawn(native.clone(), stop.clone())?;

    let (draw_tx, draw_rx) = unbounded::<Point>();
    let (worm_in, head) = bounded::<Point>(1);
    let (first_out, mut tail) = unbounded::<Point>();
    spawn_worm(head, first_out, draw_tx.clone());
    let mut segments = 1;

    let events = sdl.events();
    let frames = tick(Duration::from_secs(1) / 60);
    let mut running = true;

    while running && !stop.is_requested() {
        select! {
            recv(frames) -> _ => {
                screen.fill_rect(None, 0x00ff_ff)?;
                for p in draw_rx.try_iter() {
                    let at = Rect::new(p.x as i16, p.y as i16, 0, 0);
                    screen.blit(&image, None, Some(at))?;
                }
                for _ in tail.try_iter() {}

                let m = sdl.mouse_state()?;
                let mouse = Point { x: m.x, y: m.y };
                if let Err(TrySendError::Disconnected(_)) = worm_in.try_send(mouse) {
                    warn!(target: "sdl", "worm chain is gone");
                }
                screen.flip()?;
            }
            recv(events.receiver()) -> ev => {
                let Ok(ev) = ev else {
                    break;
                };
                match ev {
                    Event::Quit => running = false,
                    Event::Active(a) => info!(target: "sdl", "active gain={} state={:?}", a.gain, a.state),
                    Event::Keyboard(k) => {
                        info!(
                            target: "sdl",
                            "key sym={} name={} state={:?} mod={:?} char={:?}",
                            k.keysym.sym.0,
                            sdl.key_name(k.keysym.sym)?,
                            k.state,
                            k.keysym.modifiers,
                            k.keysym.char()
                        );
                        if k.keysym.sym == Key::ESCAPE && k.state == ButtonState::Pressed {
                            running = false;
                        }
                    }
                    // The frame tick samples the pointer directly.
                    Event::MouseMotion(_) => {}
                    Event::MouseButton(b) if b.state.is_pressed() => {
                        let held = sdl.mouse_state()?;
                        info!(
                            target: "sdl",
                            "click x={} y={} held={:#04b} segments={}",
                            b.x,
                            b.y,
                            held.buttons,
                            segments + 1
                        );
                        let (out, next_tail) = unbounded::<Point>();
                        spawn_worm(std::mem::replace(&mut tail, next_tail), out, draw_tx.clone());
                        segments += 1;
                    }
                    Event::Resize(r) => {
                        // Metadata already follows the window by the time the event arrives.
                        info!(target: "video", "resize w={} h={} surface={:?}", r.w, r.h, screen.size()?);
                        screen = sdl
                            .video()
                            .set_video_mode(r.w, r.h, 32, VideoFlags::RESIZABLE)
                            .context("set_video_mode after resize")?;
                    }
                    other => info!(target: "sdl", "event {}", other.name()),
                }
            }
        }
    }

    stop.request();
    if script.join().is_err() {
        warn!(target: "sdl", "script thread panicked");
    }

    info!(
        target: "sdl",
        "exit ticks={} dropped_events={}",
        sdl.ticks()?,
        sdl.dropped_events()
    );

    drop(worm_in);
    drop(image);
    drop(screen);
    sdl.quit()?;
    drop(events);
    let exit = sdl.shutdown();
    info!(target: "sdl", "poller exit={exit:?}");

    if owner.join().is_err() {
        warn!(target: "bound", "owner thread panicked");
    }
    Ok(())
}
