use log::trace;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::env;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use super::{InitFlags, NativeLayer, NativeSurface, PixelMasks, Rect, SurfaceMeta, VideoFlags};
use crate::event::{kind, Event, Key, Mod, RawEvent};
use crate::input::KEY_COUNT;

/// In-memory native layer: software surfaces, a scripted event queue and a simulated
/// window manager. Records which threads issue the thread-bound calls.
///
/// All surfaces are 32 bits per pixel regardless of the requested depth.
pub struct HeadlessNative {
    state: Mutex<State>,
    affinity: Mutex<HashMap<&'static str, Vec<ThreadId>>>,
    op_delay_us: AtomicU64,
    surface_probe: Probe,
    screen_probe: Probe,
}

struct State {
    initialized: InitFlags,
    unavailable: InitFlags,
    required_driver: Option<String>,
    init_calls: u32,
    error: String,
    started: Instant,
    events: VecDeque<RawEvent>,
    surfaces: HashMap<u64, SoftSurface>,
    next_surface: u64,
    screen: Option<u64>,
    input: InputState,
}

/// Keyboard and mouse state as the pumped events leave it.
struct InputState {
    unicode: bool,
    repeat: (i32, i32),
    keys: Vec<u8>,
    modstate: Mod,
    mouse: (i32, i32),
    rel: (i32, i32),
    buttons: u8,
    cursor: bool,
}

impl InputState {
    fn new() -> Self {
        Self {
            unicode: false,
            repeat: (0, 0),
            keys: vec![0; KEY_COUNT],
            modstate: Mod::empty(),
            mouse: (0, 0),
            rel: (0, 0),
            buttons: 0,
            cursor: true,
        }
    }

    fn track(&mut self, ev: &Event) {
        match ev {
            Event::Keyboard(k) => {
                if let Some(held) = self.keys.get_mut(k.keysym.sym.0 as usize) {
                    *held = u8::from(k.state.is_pressed());
                }
                self.modstate = k.keysym.modifiers;
            }
            Event::MouseMotion(m) => {
                self.mouse = (i32::from(m.x), i32::from(m.y));
                self.rel.0 += i32::from(m.xrel);
                self.rel.1 += i32::from(m.yrel);
                self.buttons = m.buttons;
            }
            Event::MouseButton(b) => {
                self.mouse = (i32::from(b.x), i32::from(b.y));
                if let n @ 1..=8 = b.button.index() {
                    let bit = 1u8 << (n - 1);
                    if b.state.is_pressed() {
                        self.buttons |= bit;
                    } else {
                        self.buttons &= !bit;
                    }
                }
            }
            _ => {}
        }
    }
}

/// `-1` queries; anything else sets. Returns the previous setting as 0/1.
fn toggle(flag: &mut bool, toggle: i32) -> i32 {
    let previous = i32::from(*flag);
    if toggle >= 0 {
        *flag = toggle != 0;
    }
    previous
}

fn key_name(sym: u32) -> String {
    let name = match sym {
        8 => "backspace",
        9 => "tab",
        12 => "clear",
        13 => "return",
        19 => "pause",
        27 => "escape",
        32 => "space",
        127 => "delete",
        33..=126 => return char::from(sym as u8).to_string(),
        256..=265 => return format!("[{}]", sym - 256),
        266 => "[.]",
        267 => "[/]",
        268 => "[*]",
        269 => "[-]",
        270 => "[+]",
        271 => "enter",
        272 => "equals",
        273 => "up",
        274 => "down",
        275 => "right",
        276 => "left",
        277 => "insert",
        278 => "home",
        279 => "end",
        280 => "page up",
        281 => "page down",
        282..=296 => return format!("f{}", sym - 281),
        300 => "numlock",
        301 => "caps lock",
        302 => "scroll lock",
        303 => "right shift",
        304 => "left shift",
        305 => "right ctrl",
        306 => "left ctrl",
        307 => "right alt",
        308 => "left alt",
        309 => "right meta",
        310 => "left meta",
        _ => "unknown key",
    };
    name.to_string()
}

#[derive(Clone)]
struct SoftSurface {
    flags: VideoFlags,
    width: i32,
    height: i32,
    pixels: Vec<u32>,
    clip: Rect,
    locks: u32,
}

impl SoftSurface {
    fn new(flags: VideoFlags, width: i32, height: i32) -> Self {
        let len = (width.max(0) as usize) * (height.max(0) as usize);
        Self {
            flags,
            width,
            height,
            pixels: vec![0; len],
            clip: full_rect(width, height),
            locks: 0,
        }
    }

    fn meta(&self) -> SurfaceMeta {
        SurfaceMeta {
            flags: self.flags,
            width: self.width,
            height: self.height,
            pitch: (self.width.max(0) as u32 * 4).min(u32::from(u16::MAX)) as u16,
            pixels: self.pixels.as_ptr() as usize,
            offset: 0,
        }
    }
}

/// Counts concurrently running operations.
#[derive(Default)]
struct Probe {
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    overlaps: AtomicU32,
}

impl Probe {
    fn enter(&self) -> ProbeGuard<'_> {
        let n = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        if n > 1 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.max_in_flight.fetch_max(n, Ordering::SeqCst);
        ProbeGuard(self)
    }
}

struct ProbeGuard<'a>(&'a Probe);

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn full_rect(width: i32, height: i32) -> Rect {
    Rect::new(
        0,
        0,
        width.clamp(0, i32::from(u16::MAX)) as u16,
        height.clamp(0, i32::from(u16::MAX)) as u16,
    )
}

/// Intersect `rect` (whole surface when `None`) with `[0, w) x [0, h)`.
fn region(rect: Option<Rect>, w: i32, h: i32) -> Option<(i32, i32, i32, i32)> {
    let r = rect.unwrap_or_else(|| full_rect(w, h));
    let x0 = i32::from(r.x).max(0);
    let y0 = i32::from(r.y).max(0);
    let x1 = (i32::from(r.x) + i32::from(r.w)).min(w);
    let y1 = (i32::from(r.y) + i32::from(r.h)).min(h);
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

impl Default for HeadlessNative {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessNative {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                initialized: InitFlags::empty(),
                unavailable: InitFlags::empty(),
                required_driver: None,
                init_calls: 0,
                error: String::new(),
                started: Instant::now(),
                events: VecDeque::new(),
                surfaces: HashMap::new(),
                next_surface: 1,
                screen: None,
                input: InputState::new(),
            }),
            affinity: Mutex::new(HashMap::new()),
            op_delay_us: AtomicU64::new(0),
            surface_probe: Probe::default(),
            screen_probe: Probe::default(),
        }
    }

    /* ---- scripting ---- */

    /// Queue an event as if the user produced it.
    pub fn push_event(&self, ev: &Event) {
        self.push_raw(RawEvent::from(ev));
    }

    pub fn push_raw(&self, raw: RawEvent) {
        self.state.lock().events.push_back(raw);
    }

    pub fn pending_events(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Init calls touching any of `flags` fail.
    pub fn set_unavailable(&self, flags: InitFlags) {
        self.state.lock().unavailable = flags;
    }

    /// Video init fails unless `SDL_VIDEODRIVER` equals `driver`.
    pub fn require_video_driver(&self, driver: Option<&str>) {
        self.state.lock().required_driver = driver.map(str::to_string);
    }

    /// Artificial latency added to mode setting and per-surface primitives.
    pub fn set_op_delay(&self, delay: Duration) {
        self.op_delay_us
            .store(delay.as_micros() as u64, Ordering::Relaxed);
    }

    /* ---- inspection ---- */

    /// Distinct threads that issued `op`, in first-seen order.
    pub fn threads_for(&self, op: &str) -> Vec<ThreadId> {
        self.affinity.lock().get(op).cloned().unwrap_or_default()
    }

    pub fn init_calls(&self) -> u32 {
        self.state.lock().init_calls
    }

    pub fn live_surfaces(&self) -> usize {
        self.state.lock().surfaces.len()
    }

    pub fn pixel(&self, surface: NativeSurface, x: i32, y: i32) -> Option<u32> {
        let st = self.state.lock();
        let s = st.surfaces.get(&surface.0)?;
        if x < 0 || y < 0 || x >= s.width || y >= s.height {
            return None;
        }
        s.pixels.get((y * s.width + x) as usize).copied()
    }

    /// Highest number of per-surface primitives observed running at once.
    pub fn max_concurrent_surface_ops(&self) -> u32 {
        self.surface_probe.max_in_flight.load(Ordering::SeqCst)
    }

    /// Times an operation on the video surface started while mode setting or
    /// another video surface operation was running.
    pub fn screen_overlaps(&self) -> u32 {
        self.screen_probe.overlaps.load(Ordering::SeqCst)
    }

    /* ---- internals ---- */

    fn record(&self, op: &'static str) {
        let me = thread::current().id();
        let mut g = self.affinity.lock();
        let seen = g.entry(op).or_default();
        if !seen.contains(&me) {
            seen.push(me);
        }
    }

    fn delay(&self) {
        let us = self.op_delay_us.load(Ordering::Relaxed);
        if us > 0 {
            thread::sleep(Duration::from_micros(us));
        }
    }

    fn is_screen(&self, surface: NativeSurface) -> bool {
        self.state.lock().screen == Some(surface.0)
    }

    /// Run a per-surface primitive with the probes engaged.
    fn surface_op<R>(&self, targets: &[NativeSurface], f: impl FnOnce(&mut State) -> R) -> R {
        let _any = self.surface_probe.enter();
        let _screen = targets
            .iter()
            .any(|s| self.is_screen(*s))
            .then(|| self.screen_probe.enter());
        self.delay();
        let mut st = self.state.lock();
        f(&mut st)
    }

    fn do_init(&self, op: &'static str, flags: InitFlags) -> i32 {
        self.record(op);
        let mut st = self.state.lock();
        st.init_calls += 1;

        if st.unavailable.intersects(flags) {
            st.error = format!("headless: subsystem unavailable: {:?}", st.unavailable & flags);
            return -1;
        }

        if flags.contains(InitFlags::VIDEO) {
            if let Some(required) = st.required_driver.clone() {
                let current = env::var("SDL_VIDEODRIVER").ok();
                if current.as_deref() != Some(required.as_str()) {
                    st.error = "headless: no available video device".to_string();
                    return -1;
                }
            }
        }

        st.initialized |= flags;
        0
    }

    fn new_surface(st: &mut State, flags: VideoFlags, width: i32, height: i32) -> NativeSurface {
        let id = st.next_surface;
        st.next_surface += 1;
        st.surfaces.insert(id, SoftSurface::new(flags, width, height));
        NativeSurface(id)
    }
}

fn missing(st: &mut State, surface: NativeSurface) -> i32 {
    st.error = format!("headless: invalid surface {}", surface.0);
    -1
}

impl NativeLayer for HeadlessNative {
    fn init(&self, flags: InitFlags) -> i32 {
        self.do_init("init", flags)
    }

    fn init_subsystem(&self, flags: InitFlags) -> i32 {
        self.do_init("init_subsystem", flags)
    }

    fn quit_subsystem(&self, flags: InitFlags) {
        self.record("quit_subsystem");
        self.state.lock().initialized.remove(flags);
    }

    fn was_init(&self, flags: InitFlags) -> InitFlags {
        self.record("was_init");
        self.state.lock().initialized & flags
    }

    fn quit(&self) {
        self.record("quit");
        let mut st = self.state.lock();
        st.initialized = InitFlags::empty();
        st.surfaces.clear();
        st.screen = None;
        st.events.clear();
        st.input = InputState::new();
    }

    fn error(&self) -> String {
        self.record("error");
        self.state.lock().error.clone()
    }

    fn set_error(&self, message: &str) {
        self.record("set_error");
        self.state.lock().error = message.to_string();
    }

    fn clear_error(&self) {
        self.record("clear_error");
        self.state.lock().error.clear();
    }

    fn ticks(&self) -> u32 {
        self.record("ticks");
        self.state.lock().started.elapsed().as_millis() as u32
    }

    fn poll_event(&self) -> Option<RawEvent> {
        self.record("poll_event");
        let mut st = self.state.lock();
        let mut raw = st.events.pop_front()?;

        match raw.decode() {
            // The window manager resized the window: the video surface follows.
            Some(Event::Resize(r)) => {
                let screen = st.screen;
                if let Some(s) = screen.and_then(|id| st.surfaces.get_mut(&id)) {
                    *s = SoftSurface::new(s.flags, r.w, r.h);
                    trace!(target: "headless", "screen.resize w={} h={}", r.w, r.h);
                }
            }
            Some(Event::Keyboard(mut k)) => {
                st.input.track(&Event::Keyboard(k));
                if !st.input.unicode && k.keysym.unicode != 0 {
                    k.keysym.unicode = 0;
                    raw = RawEvent::from(&Event::Keyboard(k));
                }
            }
            Some(ev) => st.input.track(&ev),
            None => {}
        }

        Some(raw)
    }

    fn enable_unicode(&self, toggle_to: i32) -> i32 {
        self.record("enable_unicode");
        toggle(&mut self.state.lock().input.unicode, toggle_to)
    }

    fn enable_key_repeat(&self, delay: i32, interval: i32) -> i32 {
        self.record("enable_key_repeat");
        let mut st = self.state.lock();
        if delay < 0 || interval < 0 {
            st.error = format!("headless: invalid key repeat delay={delay} interval={interval}");
            return -1;
        }
        st.input.repeat = (delay, interval);
        0
    }

    fn key_repeat(&self) -> (i32, i32) {
        self.record("key_repeat");
        self.state.lock().input.repeat
    }

    fn key_state(&self) -> Vec<u8> {
        self.record("key_state");
        self.state.lock().input.keys.clone()
    }

    fn mod_state(&self) -> Mod {
        self.record("mod_state");
        self.state.lock().input.modstate
    }

    fn set_mod_state(&self, modstate: Mod) {
        self.record("set_mod_state");
        self.state.lock().input.modstate = modstate;
    }

    fn key_name(&self, key: Key) -> String {
        self.record("key_name");
        key_name(key.0)
    }

    fn mouse_state(&self) -> (i32, i32, u8) {
        self.record("mouse_state");
        let st = self.state.lock();
        (st.input.mouse.0, st.input.mouse.1, st.input.buttons)
    }

    fn relative_mouse_state(&self) -> (i32, i32, u8) {
        self.record("relative_mouse_state");
        let mut st = self.state.lock();
        let (dx, dy) = std::mem::take(&mut st.input.rel);
        (dx, dy, st.input.buttons)
    }

    fn show_cursor(&self, toggle_to: i32) -> i32 {
        self.record("show_cursor");
        toggle(&mut self.state.lock().input.cursor, toggle_to)
    }

    fn set_video_mode(
        &self,
        width: i32,
        height: i32,
        _bpp: i32,
        flags: VideoFlags,
    ) -> Option<NativeSurface> {
        self.record("set_video_mode");
        let _screen = self.screen_probe.enter();
        self.delay();

        let mut st = self.state.lock();
        if !st.initialized.contains(InitFlags::VIDEO) {
            st.error = "headless: video subsystem not initialized".to_string();
            return None;
        }
        if width <= 0 || height <= 0 {
            st.error = format!("headless: invalid mode {width}x{height}");
            return None;
        }

        if let Some(old) = st.screen.take() {
            st.surfaces.remove(&old);
        }
        let s = Self::new_surface(&mut st, flags, width, height);
        st.screen = Some(s.0);
        Some(s)
    }

    fn video_mode_ok(&self, width: i32, height: i32, bpp: i32, _flags: VideoFlags) -> i32 {
        self.record("video_mode_ok");
        if width <= 0 || height <= 0 {
            return 0;
        }
        match bpp {
            8 | 16 | 24 | 32 => bpp,
            _ => 32,
        }
    }

    fn create_rgb_surface(
        &self,
        flags: VideoFlags,
        width: i32,
        height: i32,
        _bpp: i32,
        _masks: PixelMasks,
    ) -> Option<NativeSurface> {
        self.record("create_rgb_surface");
        let mut st = self.state.lock();
        if width <= 0 || height <= 0 {
            st.error = format!("headless: invalid surface size {width}x{height}");
            return None;
        }
        Some(Self::new_surface(&mut st, flags, width, height))
    }

    fn surface_meta(&self, surface: NativeSurface) -> SurfaceMeta {
        self.record("surface_meta");
        self.state
            .lock()
            .surfaces
            .get(&surface.0)
            .map(SoftSurface::meta)
            .unwrap_or_default()
    }

    fn free_surface(&self, surface: NativeSurface) {
        self.surface_op(&[], |st| {
            // The video surface belongs to the library.
            if st.screen != Some(surface.0) {
                st.surfaces.remove(&surface.0);
            }
        })
    }

    fn fill_rect(&self, surface: NativeSurface, rect: Option<Rect>, color: u32) -> i32 {
        self.surface_op(&[surface], |st| {
            let Some(s) = st.surfaces.get_mut(&surface.0) else {
                return missing(st, surface);
            };
            let clip = region(Some(s.clip), s.width, s.height);
            let area = region(rect, s.width, s.height);
            if let (Some((cx0, cy0, cx1, cy1)), Some((x0, y0, x1, y1))) = (clip, area) {
                for y in y0.max(cy0)..y1.min(cy1) {
                    for x in x0.max(cx0)..x1.min(cx1) {
                        s.pixels[(y * s.width + x) as usize] = color;
                    }
                }
            }
            0
        })
    }

    fn blit(
        &self,
        src: NativeSurface,
        srcrect: Option<Rect>,
        dst: NativeSurface,
        dstrect: Option<Rect>,
    ) -> i32 {
        self.surface_op(&[src, dst], |st| {
            let Some(from) = st.surfaces.get(&src.0).cloned() else {
                return missing(st, src);
            };
            let Some(to) = st.surfaces.get_mut(&dst.0) else {
                return missing(st, dst);
            };
            let Some((sx0, sy0, sx1, sy1)) = region(srcrect, from.width, from.height) else {
                return 0;
            };
            let (dx, dy) = dstrect
                .map(|r| (i32::from(r.x), i32::from(r.y)))
                .unwrap_or((0, 0));

            for y in sy0..sy1 {
                let ty = dy + (y - sy0);
                if ty < 0 || ty >= to.height {
                    continue;
                }
                for x in sx0..sx1 {
                    let tx = dx + (x - sx0);
                    if tx < 0 || tx >= to.width {
                        continue;
                    }
                    to.pixels[(ty * to.width + tx) as usize] =
                        from.pixels[(y * from.width + x) as usize];
                }
            }
            0
        })
    }

    fn flip(&self, surface: NativeSurface) -> i32 {
        self.surface_op(&[surface], |st| {
            if st.surfaces.contains_key(&surface.0) {
                0
            } else {
                missing(st, surface)
            }
        })
    }

    fn update_rect(&self, surface: NativeSurface, _rect: Rect) {
        self.surface_op(&[surface], |_| ())
    }

    fn lock_surface(&self, surface: NativeSurface) -> i32 {
        self.surface_op(&[surface], |st| match st.surfaces.get_mut(&surface.0) {
            Some(s) => {
                s.locks += 1;
                0
            }
            None => missing(st, surface),
        })
    }

    fn unlock_surface(&self, surface: NativeSurface) {
        self.surface_op(&[surface], |st| {
            if let Some(s) = st.surfaces.get_mut(&surface.0) {
                s.locks = s.locks.saturating_sub(1);
            }
        })
    }

    fn clip_rect(&self, surface: NativeSurface) -> Rect {
        self.surface_op(&[], |st| {
            st.surfaces
                .get(&surface.0)
                .map(|s| s.clip)
                .unwrap_or_default()
        })
    }

    fn set_clip_rect(&self, surface: NativeSurface, rect: Option<Rect>) -> bool {
        self.surface_op(&[surface], |st| match st.surfaces.get_mut(&surface.0) {
            Some(s) => {
                s.clip = match region(rect, s.width, s.height) {
                    Some((x0, y0, x1, y1)) => {
                        Rect::new(x0 as i16, y0 as i16, (x1 - x0) as u16, (y1 - y0) as u16)
                    }
                    None => Rect::default(),
                };
                s.clip != Rect::default() || rect.is_none()
            }
            None => false,
        })
    }
}
