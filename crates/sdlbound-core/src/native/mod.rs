//! Boundary to the single-threaded native library.

mod headless;

pub use headless::HeadlessNative;

use bitflags::bitflags;

use crate::event::{Key, Mod, RawEvent};

bitflags! {
    /// Subsystem selection for init/quit.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct InitFlags: u32 {
        const TIMER = 0x0000_0001;
        const AUDIO = 0x0000_0010;
        const VIDEO = 0x0000_0020;
        const CDROM = 0x0000_0100;
        const JOYSTICK = 0x0000_0200;
        const NOPARACHUTE = 0x0010_0000;
        const EVENTTHREAD = 0x0100_0000;
        const EVERYTHING = 0x0000_FFFF;
    }
}

bitflags! {
    /// Surface and video mode flags.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct VideoFlags: u32 {
        const SWSURFACE = 0x0000_0000;
        const HWSURFACE = 0x0000_0001;
        const ASYNCBLIT = 0x0000_0004;
        const OPENGL = 0x0000_0002;
        const RESIZABLE = 0x0000_0010;
        const NOFRAME = 0x0000_0020;
        const HWACCEL = 0x0000_0100;
        const SRCCOLORKEY = 0x0000_1000;
        const SRCALPHA = 0x0001_0000;
        const ANYFORMAT = 0x1000_0000;
        const HWPALETTE = 0x2000_0000;
        const DOUBLEBUF = 0x4000_0000;
        const FULLSCREEN = 0x8000_0000;
    }
}

/// Opaque native surface handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct NativeSurface(pub u64);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    #[inline]
    pub const fn new(x: i16, y: i16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct PixelMasks {
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
}

/// Metadata mirrored from a native surface. Goes stale when the native side changes it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SurfaceMeta {
    pub flags: VideoFlags,
    pub width: i32,
    pub height: i32,
    pub pitch: u16,
    /// Address of the pixel buffer. Only meaningful to the native layer.
    pub pixels: usize,
    pub offset: i32,
}

/// Calls the core needs from the native library.
///
/// Library-global calls (init/quit, error state, ticks, event polling, input state,
/// mode setting, surface creation and metadata) are only ever issued from the owner thread of the
/// context's `ThreadBound`. Per-surface primitives may arrive from any thread, but
/// never concurrently for the same surface while one of them writes.
///
/// Status codes follow native conventions: 0 on success, negative on failure.
pub trait NativeLayer: Send + Sync + 'static {
    fn init(&self, flags: InitFlags) -> i32;
    fn init_subsystem(&self, flags: InitFlags) -> i32;
    fn quit_subsystem(&self, flags: InitFlags);
    fn was_init(&self, flags: InitFlags) -> InitFlags;
    fn quit(&self);

    fn error(&self) -> String;
    fn set_error(&self, message: &str);
    fn clear_error(&self);
    fn ticks(&self) -> u32;

    /// Non-blocking. `None` covers both "queue empty" and "poll failed".
    ///
    /// Also where keyboard and mouse state follow the events taken off the queue.
    fn poll_event(&self) -> Option<RawEvent>;

    /// `toggle`: -1 queries, 0 disables, 1 enables. Returns the previous setting.
    fn enable_unicode(&self, toggle: i32) -> i32;
    fn enable_key_repeat(&self, delay: i32, interval: i32) -> i32;
    fn key_repeat(&self) -> (i32, i32);
    /// One byte per key code, non-zero while held.
    fn key_state(&self) -> Vec<u8>;
    fn mod_state(&self) -> Mod;
    fn set_mod_state(&self, modstate: Mod);
    fn key_name(&self, key: Key) -> String;
    /// `(x, y, buttons)`.
    fn mouse_state(&self) -> (i32, i32, u8);
    /// Motion since the previous call, and the buttons.
    fn relative_mouse_state(&self) -> (i32, i32, u8);
    /// Same toggle convention as [`enable_unicode`](Self::enable_unicode).
    fn show_cursor(&self, toggle: i32) -> i32;

    fn set_video_mode(
        &self,
        width: i32,
        height: i32,
        bpp: i32,
        flags: VideoFlags,
    ) -> Option<NativeSurface>;
    /// Closest supported bpp, 0 if the mode is not available.
    fn video_mode_ok(&self, width: i32, height: i32, bpp: i32, flags: VideoFlags) -> i32;
    fn create_rgb_surface(
        &self,
        flags: VideoFlags,
        width: i32,
        height: i32,
        bpp: i32,
        masks: PixelMasks,
    ) -> Option<NativeSurface>;
    fn surface_meta(&self, surface: NativeSurface) -> SurfaceMeta;

    fn free_surface(&self, surface: NativeSurface);
    fn fill_rect(&self, surface: NativeSurface, rect: Option<Rect>, color: u32) -> i32;
    fn blit(
        &self,
        src: NativeSurface,
        srcrect: Option<Rect>,
        dst: NativeSurface,
        dstrect: Option<Rect>,
    ) -> i32;
    fn flip(&self, surface: NativeSurface) -> i32;
    fn update_rect(&self, surface: NativeSurface, rect: Rect);
    fn lock_surface(&self, surface: NativeSurface) -> i32;
    fn unlock_surface(&self, surface: NativeSurface);
    fn clip_rect(&self, surface: NativeSurface) -> Rect;
    fn set_clip_rect(&self, surface: NativeSurface, rect: Option<Rect>) -> bool;
}
