//! Display surface designation and the two-tier surface lock scheme.
//!
//! Lock order is always global -> surface. When an operation involves two distinct
//! surfaces, their locks are taken in ascending surface id order.

use log::debug;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{SdlError, SdlResult};
use crate::native::{NativeLayer, NativeSurface, PixelMasks, Rect, SurfaceMeta, VideoFlags};
use crate::thread::ThreadBound;

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Native handle plus the metadata mirrored from it.
struct SurfaceState {
    native: NativeSurface,
    meta: SurfaceMeta,
}

type Slot = Option<SurfaceState>;

/// Lock-protected part of a surface. `None` once the surface is destroyed.
struct SurfaceCore {
    id: u64,
    state: RwLock<Slot>,
    current: AtomicBool,
}

impl SurfaceCore {
    fn new(native: NativeSurface, meta: SurfaceMeta) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed),
            state: RwLock::new(Some(SurfaceState { native, meta })),
            current: AtomicBool::new(false),
        })
    }
}

/// State protected by the global lock.
#[derive(Default)]
pub(crate) struct GlobalState {
    current: Option<Arc<SurfaceCore>>,
}

impl GlobalState {
    /// Re-read the current surface's metadata from the native side.
    pub(crate) fn refresh_current(&mut self, native: &dyn NativeLayer) {
        let Some(core) = self.current.as_ref() else {
            return;
        };
        let mut st = core.state.write();
        if let Some(s) = st.as_mut() {
            s.meta = native.surface_meta(s.native);
            debug!(
                target: "video",
                "surface.refresh id={} w={} h={}",
                core.id,
                s.meta.width,
                s.meta.height
            );
        }
    }

    /// Destroy the current surface. The native video surface itself belongs to the
    /// library, so only the wrapper goes away.
    pub(crate) fn retire_current(&mut self) {
        if let Some(core) = self.current.take() {
            // Empty the slot before clearing the flag: a writer that no longer sees the
            // surface as current must also find it destroyed.
            core.state.write().take();
            core.current.store(false, Ordering::Release);
            debug!(target: "video", "surface.retire id={}", core.id);
        }
    }

    fn install_current(&mut self, core: Arc<SurfaceCore>) {
        self.retire_current();
        core.current.store(true, Ordering::Release);
        debug!(target: "video", "surface.current id={}", core.id);
        self.current = Some(core);
    }

    fn is(&self, core: &SurfaceCore) -> bool {
        self.current.as_ref().is_some_and(|c| c.id == core.id)
    }
}

/// Held global lock. While it is alive no library-global operation, mode change or
/// current-surface write can run.
///
/// The lock is not reentrant. The holding thread must not call [`ThreadBound::run`],
/// any `Sdl` library call, or a writer on the current display surface ([`Surface::fill_rect`],
/// [`Surface::flip`], [`Surface::blit`] onto it, and so on): each of those takes the
/// global lock again and deadlocks. Writers on owned surfaces are fine.
pub struct GlobalGuard<'a> {
    inner: MutexGuard<'a, GlobalState>,
}

impl GlobalGuard<'_> {
    /// Size of the current display surface, if there is one.
    pub fn current_size(&self) -> Option<(i32, i32)> {
        let core = self.inner.current.as_ref()?;
        let st = core.state.read();
        st.as_ref().map(|s| (s.meta.width, s.meta.height))
    }
}

pub(crate) struct Shared {
    pub(crate) native: Arc<dyn NativeLayer>,
    pub(crate) thread: ThreadBound,
    pub(crate) global: Mutex<GlobalState>,
}

impl Shared {
    /// Fetch the native error string on the owner thread.
    ///
    /// Must not be called with the global lock held.
    fn last_error(self: &Arc<Self>) -> String {
        let shared = self.clone();
        self.thread
            .run(move || {
                let _g = shared.global.lock();
                shared.native.error()
            })
            .unwrap_or_else(|e| e.to_string())
    }

    fn check(self: &Arc<Self>, op: &'static str, code: i32) -> SdlResult<()> {
        if code < 0 {
            return Err(SdlError::Native {
                op,
                code,
                message: self.last_error(),
            });
        }
        Ok(())
    }
}

/// Entry point for mode setting and surface creation.
#[derive(Clone)]
pub struct Video {
    shared: Arc<Shared>,
}

impl Video {
    pub fn new(native: Arc<dyn NativeLayer>, thread: ThreadBound) -> Self {
        Self {
            shared: Arc::new(Shared {
                native,
                thread,
                global: Mutex::new(GlobalState::default()),
            }),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    #[inline]
    pub fn native(&self) -> &Arc<dyn NativeLayer> {
        &self.shared.native
    }

    #[inline]
    pub fn thread(&self) -> &ThreadBound {
        &self.shared.thread
    }

    /// Take the global lock. See [`GlobalGuard`] for what the holder must not call.
    pub fn lock_global(&self) -> GlobalGuard<'_> {
        GlobalGuard {
            inner: self.shared.global.lock(),
        }
    }

    /// Set the display mode. The previous display surface is destroyed and the
    /// returned one becomes current. On failure there is no current surface.
    pub fn set_video_mode(
        &self,
        width: i32,
        height: i32,
        bpp: i32,
        flags: VideoFlags,
    ) -> SdlResult<Surface> {
        let shared = self.shared.clone();
        let made = self.shared.thread.run(move || {
            let mut g = shared.global.lock();
            match shared.native.set_video_mode(width, height, bpp, flags) {
                Some(native) => {
                    let core = SurfaceCore::new(native, shared.native.surface_meta(native));
                    g.install_current(core.clone());
                    Ok(core)
                }
                None => {
                    g.retire_current();
                    Err(shared.native.error())
                }
            }
        })?;

        match made {
            Ok(core) => {
                debug!(target: "video", "mode.set w={width} h={height} bpp={bpp} flags={flags:?}");
                Ok(self.wrap(core, false))
            }
            Err(message) => Err(SdlError::NoSurface {
                op: "set_video_mode",
                message,
            }),
        }
    }

    /// Handle to the current display surface.
    pub fn video_surface(&self) -> Option<Surface> {
        let core = self.shared.global.lock().current.clone()?;
        Some(self.wrap(core, false))
    }

    /// Closest supported bpp for the mode, 0 when unsupported.
    pub fn video_mode_ok(&self, width: i32, height: i32, bpp: i32, flags: VideoFlags) -> SdlResult<i32> {
        let shared = self.shared.clone();
        Ok(self.shared.thread.run(move || {
            let _g = shared.global.lock();
            shared.native.video_mode_ok(width, height, bpp, flags)
        })?)
    }

    /// Create an off-screen surface, freed when the returned handle drops.
    pub fn create_rgb_surface(
        &self,
        flags: VideoFlags,
        width: i32,
        height: i32,
        bpp: i32,
        masks: PixelMasks,
    ) -> SdlResult<Surface> {
        let shared = self.shared.clone();
        let made = self.shared.thread.run(move || {
            let native = &shared.native;
            native
                .create_rgb_surface(flags, width, height, bpp, masks)
                .map(|s| SurfaceCore::new(s, native.surface_meta(s)))
                .ok_or_else(|| native.error())
        })?;

        match made {
            Ok(core) => Ok(self.wrap(core, true)),
            Err(message) => Err(SdlError::NoSurface {
                op: "create_rgb_surface",
                message,
            }),
        }
    }

    /// Copy `src` onto `dst`.
    #[inline]
    pub fn blit_surface(
        &self,
        src: &Surface,
        srcrect: Option<Rect>,
        dst: &Surface,
        dstrect: Option<Rect>,
    ) -> SdlResult<()> {
        dst.blit(src, srcrect, dstrect)
    }

    fn wrap(&self, core: Arc<SurfaceCore>, owned: bool) -> Surface {
        Surface {
            core,
            shared: self.shared.clone(),
            owned,
        }
    }
}

/// Handle to a native surface.
///
/// Writers on the current display surface are ordered against mode changes through
/// the global lock; everything else only takes the surface's own lock.
pub struct Surface {
    core: Arc<SurfaceCore>,
    shared: Arc<Shared>,
    owned: bool,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.core.id)
            .field("current", &self.is_current())
            .field("owned", &self.owned)
            .finish()
    }
}

impl Surface {
    #[inline]
    pub fn id(&self) -> u64 {
        self.core.id
    }

    #[inline]
    pub fn is_current(&self) -> bool {
        self.core.current.load(Ordering::Acquire)
    }

    pub fn is_freed(&self) -> bool {
        self.core.state.read().is_none()
    }

    /// Cached metadata. Refreshed on mode changes and resize events.
    pub fn meta(&self) -> SdlResult<SurfaceMeta> {
        self.core
            .state
            .read()
            .as_ref()
            .map(|s| s.meta)
            .ok_or(SdlError::SurfaceFreed)
    }

    pub fn size(&self) -> SdlResult<(i32, i32)> {
        self.meta().map(|m| (m.width, m.height))
    }

    /// Native handle for collaborating wrappers.
    pub fn native(&self) -> SdlResult<NativeSurface> {
        self.meta_read(|s| s.native)
    }

    pub fn fill_rect(&self, rect: Option<Rect>, color: u32) -> SdlResult<()> {
        self.write("fill_rect", |n, s| n.fill_rect(s, rect, color))
    }

    pub fn flip(&self) -> SdlResult<()> {
        self.write("flip", |n, s| n.flip(s))
    }

    /// An all-zero rect updates the whole surface.
    pub fn update_rect(&self, rect: Rect) -> SdlResult<()> {
        self.write("update_rect", |n, s| {
            n.update_rect(s, rect);
            0
        })
    }

    pub fn lock(&self) -> SdlResult<()> {
        self.write("lock_surface", |n, s| n.lock_surface(s))
    }

    pub fn unlock(&self) -> SdlResult<()> {
        self.write("unlock_surface", |n, s| {
            n.unlock_surface(s);
            0
        })
    }

    pub fn clip_rect(&self) -> SdlResult<Rect> {
        let st = self.core.state.read();
        let s = st.as_ref().ok_or(SdlError::SurfaceFreed)?;
        Ok(self.shared.native.clip_rect(s.native))
    }

    /// `None` resets clipping to the whole surface. Returns whether anything remains visible.
    pub fn set_clip_rect(&self, rect: Option<Rect>) -> SdlResult<bool> {
        let _g = self.global_if_current();
        let st = self.core.state.write();
        let s = st.as_ref().ok_or(SdlError::SurfaceFreed)?;
        Ok(self.shared.native.set_clip_rect(s.native, rect))
    }

    /// Copy `src` onto this surface. `src` may be this surface.
    pub fn blit(&self, src: &Surface, srcrect: Option<Rect>, dstrect: Option<Rect>) -> SdlResult<()> {
        let code = {
            let _g = (self.is_current() || src.is_current()).then(|| self.shared.global.lock());
            let native = &*self.shared.native;

            if Arc::ptr_eq(&self.core, &src.core) {
                let st = self.core.state.write();
                let s = st.as_ref().ok_or(SdlError::SurfaceFreed)?;
                native.blit(s.native, srcrect, s.native, dstrect)
            } else if src.core.id < self.core.id {
                let from = src.core.state.read();
                let to = self.core.state.write();
                blit_locked(native, &from, srcrect, &to, dstrect)?
            } else {
                let to = self.core.state.write();
                let from = src.core.state.read();
                blit_locked(native, &from, srcrect, &to, dstrect)?
            }
        };
        self.shared.check("blit", code)
    }

    /// Re-read metadata from the native side.
    pub fn reload(&self) -> SdlResult<()> {
        let shared = self.shared.clone();
        let core = self.core.clone();
        self.shared.thread.run(move || {
            let _g = core.current.load(Ordering::Acquire).then(|| shared.global.lock());
            let mut st = core.state.write();
            let s = st.as_mut().ok_or(SdlError::SurfaceFreed)?;
            s.meta = shared.native.surface_meta(s.native);
            Ok(())
        })?
    }

    /// Release the surface. Freeing the display surface clears the current designation;
    /// the native video surface stays with the library. Freeing twice is a no-op.
    pub fn free(&self) {
        let mut g = self.global_if_current();
        let taken = self.core.state.write().take();
        if let Some(g) = g.as_mut() {
            if g.is(&self.core) {
                g.current = None;
            }
        }
        self.core.current.store(false, Ordering::Release);
        drop(g);

        if let Some(s) = taken {
            if self.owned {
                self.shared.native.free_surface(s.native);
            }
            debug!(target: "video", "surface.free id={} owned={}", self.core.id, self.owned);
        }
    }

    fn global_if_current(&self) -> Option<MutexGuard<'_, GlobalState>> {
        self.is_current().then(|| self.shared.global.lock())
    }

    fn meta_read<R>(&self, f: impl FnOnce(&SurfaceState) -> R) -> SdlResult<R> {
        let st = self.core.state.read();
        st.as_ref().map(f).ok_or(SdlError::SurfaceFreed)
    }

    fn write(
        &self,
        op: &'static str,
        f: impl FnOnce(&dyn NativeLayer, NativeSurface) -> i32,
    ) -> SdlResult<()> {
        let code = {
            let _g = self.global_if_current();
            let st = self.core.state.write();
            let s = st.as_ref().ok_or(SdlError::SurfaceFreed)?;
            f(&*self.shared.native, s.native)
        };
        self.shared.check(op, code)
    }
}

fn blit_locked(
    native: &dyn NativeLayer,
    from: &RwLockReadGuard<'_, Slot>,
    srcrect: Option<Rect>,
    to: &RwLockWriteGuard<'_, Slot>,
    dstrect: Option<Rect>,
) -> SdlResult<i32> {
    let src = from.as_ref().ok_or(SdlError::SurfaceFreed)?;
    let dst = to.as_ref().ok_or(SdlError::SurfaceFreed)?;
    Ok(native.blit(src.native, srcrect, dst.native, dstrect))
}

impl Drop for Surface {
    fn drop(&mut self) {
        if self.owned {
            self.free();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{HeadlessNative, InitFlags};
    use std::thread;
    use std::time::Duration;

    fn setup() -> (Arc<HeadlessNative>, Video) {
        let native = Arc::new(HeadlessNative::new());
        assert_eq!(native.init(InitFlags::VIDEO), 0);
        let video = Video::new(native.clone(), ThreadBound::new());
        (native, video)
    }

    #[test]
    fn new_mode_supersedes_previous_surface() {
        let (_native, video) = setup();
        let first = video.set_video_mode(320, 200, 32, VideoFlags::SWSURFACE).unwrap();
        assert!(first.is_current());
        assert_eq!(first.size().unwrap(), (320, 200));

        let second = video.set_video_mode(640, 480, 32, VideoFlags::SWSURFACE).unwrap();
        assert!(!first.is_current());
        assert!(first.is_freed());
        assert!(matches!(first.fill_rect(None, 1), Err(SdlError::SurfaceFreed)));
        assert_eq!(video.video_surface().unwrap().id(), second.id());
    }

    #[test]
    fn failed_mode_leaves_no_current_surface() {
        let (_native, video) = setup();
        let screen = video.set_video_mode(320, 200, 32, VideoFlags::SWSURFACE).unwrap();
        let err = video.set_video_mode(0, 0, 32, VideoFlags::SWSURFACE).unwrap_err();
        assert!(matches!(err, SdlError::NoSurface { op: "set_video_mode", .. }));
        assert!(screen.is_freed());
        assert!(video.video_surface().is_none());
    }

    #[test]
    fn owned_surface_is_freed_on_drop() {
        let (native, video) = setup();
        let before = native.live_surfaces();
        let s = video
            .create_rgb_surface(VideoFlags::SWSURFACE, 4, 4, 32, PixelMasks::default())
            .unwrap();
        assert_eq!(native.live_surfaces(), before + 1);
        drop(s);
        assert_eq!(native.live_surfaces(), before);
    }

    #[test]
    fn freeing_display_surface_clears_designation() {
        let (native, video) = setup();
        let screen = video.set_video_mode(64, 64, 32, VideoFlags::SWSURFACE).unwrap();
        screen.free();
        screen.free();
        assert!(video.video_surface().is_none());
        assert!(!screen.is_current());
        assert_eq!(native.live_surfaces(), 1);
    }

    #[test]
    fn native_failure_carries_error_string() {
        let (native, video) = setup();
        let s = video
            .create_rgb_surface(VideoFlags::SWSURFACE, 4, 4, 32, PixelMasks::default())
            .unwrap();
        native.free_surface(s.native().unwrap());

        match s.flip() {
            Err(SdlError::Native { op, code, message }) => {
                assert_eq!(op, "flip");
                assert!(code < 0);
                assert!(message.contains("invalid surface"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blit_between_current_and_offscreen() {
        let (native, video) = setup();
        let screen = video.set_video_mode(8, 8, 32, VideoFlags::SWSURFACE).unwrap();
        let img = video
            .create_rgb_surface(VideoFlags::SWSURFACE, 2, 2, 32, PixelMasks::default())
            .unwrap();
        img.fill_rect(None, 0xabcdef).unwrap();

        video
            .blit_surface(&img, None, &screen, Some(Rect::new(3, 3, 0, 0)))
            .unwrap();
        let n = screen.native().unwrap();
        assert_eq!(native.pixel(n, 3, 3), Some(0xabcdef));
        assert_eq!(native.pixel(n, 4, 4), Some(0xabcdef));
        assert_eq!(native.pixel(n, 5, 5), Some(0));

        // Opposite direction: locks still go lowest id first.
        screen.fill_rect(None, 1).unwrap();
        img.blit(&screen, None, None).unwrap();
        assert_eq!(native.pixel(img.native().unwrap(), 0, 0), Some(1));
    }

    #[test]
    fn global_guard_reports_current_size() {
        let (_native, video) = setup();
        assert_eq!(video.lock_global().current_size(), None);
        let _screen = video.set_video_mode(100, 50, 32, VideoFlags::SWSURFACE).unwrap();
        assert_eq!(video.lock_global().current_size(), Some((100, 50)));
    }

    #[test]
    fn global_guard_holds_off_current_surface_writers_only() {
        let (_native, video) = setup();
        let screen = Arc::new(video.set_video_mode(16, 16, 32, VideoFlags::SWSURFACE).unwrap());
        let image = video
            .create_rgb_surface(VideoFlags::SWSURFACE, 4, 4, 32, PixelMasks::default())
            .unwrap();

        let guard = video.lock_global();
        image.fill_rect(None, 1).unwrap();

        let writer = {
            let screen = screen.clone();
            thread::spawn(move || screen.fill_rect(None, 2))
        };
        thread::sleep(Duration::from_millis(30));
        assert!(!writer.is_finished());

        drop(guard);
        writer.join().unwrap().unwrap();
    }
}
