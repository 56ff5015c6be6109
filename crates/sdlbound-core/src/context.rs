use log::{info, warn};
use parking_lot::Mutex;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::SdlConfig;
use crate::error::{SdlError, SdlResult};
use crate::native::{InitFlags, NativeLayer};
use crate::poll::{EventPoller, PollExit, PollerHandle};
use crate::stream::{self, EventSink, EventStream};
use crate::thread::ThreadBound;
use crate::video::{GlobalState, Video};

/// Bumped only on semantically incompatible changes.
pub const BINDINGS_VERSION: &str = "sdlbound bindings 1.0";

const VIDEO_DRIVER_VAR: &str = "SDL_VIDEODRIVER";

static LIVE: AtomicBool = AtomicBool::new(false);

/// The process-wide library context.
///
/// Owns the event stream, the poller and the current display surface designation.
/// Only one may exist at a time. Dropping it halts and joins the poller, then frees
/// the slot; the executor stays open for the caller.
pub struct Sdl {
    config: SdlConfig,
    video: Video,
    events: EventStream,
    sink: Mutex<Option<EventSink>>,
    poller: Mutex<Option<PollerHandle>>,
}

impl Sdl {
    /// Claim the process slot. `thread` is the executor every library call is bound to;
    /// it should already have an owner (see [`ThreadBound::spawn_owner`]).
    pub fn new(config: SdlConfig, native: Arc<dyn NativeLayer>, thread: ThreadBound) -> SdlResult<Self> {
        if LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SdlError::AlreadyRunning);
        }

        let (sink, events) = stream::channel(config.stream);
        info!(
            target: "sdl",
            "context.new stream={:?} poll_interval_ms={} owner={:?}",
            config.stream,
            config.poll_interval().as_millis(),
            thread.state()
        );

        Ok(Self {
            config,
            video: Video::new(native, thread),
            events,
            sink: Mutex::new(Some(sink)),
            poller: Mutex::new(None),
        })
    }

    #[inline]
    pub fn config(&self) -> &SdlConfig {
        &self.config
    }

    #[inline]
    pub fn video(&self) -> &Video {
        &self.video
    }

    #[inline]
    pub fn thread(&self) -> &ThreadBound {
        self.video.thread()
    }

    /// A reader of the event stream. Clones compete for events.
    #[inline]
    pub fn events(&self) -> EventStream {
        self.events.clone()
    }

    #[inline]
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    #[inline]
    pub fn version(&self) -> &'static str {
        BINDINGS_VERSION
    }

    pub fn poller_running(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Initialize subsystems and start the poller. The poller starts on the first
    /// call even when initialization fails.
    pub fn init(&self, flags: InitFlags) -> SdlResult<()> {
        let fallback = self.config.video_driver_fallback.clone();
        let status = self.global(move |native, _| {
            with_driver_fallback(flags, fallback.as_deref(), || native.init(flags), native)
        });

        self.start_poller()?;
        status?.map_err(|(code, message)| SdlError::Native {
            op: "init",
            code,
            message,
        })
    }

    pub fn init_subsystem(&self, flags: InitFlags) -> SdlResult<()> {
        let fallback = self.config.video_driver_fallback.clone();
        self.global(move |native, _| {
            with_driver_fallback(flags, fallback.as_deref(), || native.init_subsystem(flags), native)
        })?
        .map_err(|(code, message)| SdlError::Native {
            op: "init_subsystem",
            code,
            message,
        })
    }

    pub fn quit_subsystem(&self, flags: InitFlags) -> SdlResult<()> {
        self.global(move |native, _| native.quit_subsystem(flags))
    }

    pub fn was_init(&self, flags: InitFlags) -> SdlResult<InitFlags> {
        self.global(move |native, _| native.was_init(flags))
    }

    /// Shut the library down. The current display surface is destroyed first.
    pub fn quit(&self) -> SdlResult<()> {
        self.global(|native, g| {
            g.retire_current();
            native.quit();
        })?;
        info!(target: "sdl", "quit");
        Ok(())
    }

    pub fn error(&self) -> SdlResult<String> {
        self.global(|native, _| native.error())
    }

    pub fn set_error(&self, message: &str) -> SdlResult<()> {
        let message = message.to_string();
        self.global(move |native, _| native.set_error(&message))
    }

    pub fn clear_error(&self) -> SdlResult<()> {
        self.global(|native, _| native.clear_error())
    }

    /// Milliseconds since initialization.
    pub fn ticks(&self) -> SdlResult<u32> {
        self.global(|native, _| native.ticks())
    }

    /// Sleep the calling thread. Does not touch the library.
    pub fn delay(&self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }

    /// Close the executor and wait for the poller. The owner thread is left to the caller.
    ///
    /// `None` when the poller never started, or when called on the owner thread (the
    /// poller is then reaped in the background).
    pub fn shutdown(self) -> Option<PollExit> {
        self.thread().close();
        if self.thread().is_owner_thread() {
            return None;
        }
        let handle = self.poller.lock().take()?;
        join_poller(handle)
    }

    /// Run `f` on the owner thread with the global lock held.
    pub(crate) fn global<F, R>(&self, f: F) -> SdlResult<R>
    where
        F: FnOnce(&dyn NativeLayer, &mut GlobalState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let shared = self.video.shared().clone();
        Ok(self.thread().run(move || {
            let mut g = shared.global.lock();
            f(&*shared.native, &mut g)
        })?)
    }

    fn start_poller(&self) -> SdlResult<()> {
        let Some(sink) = self.sink.lock().take() else {
            return Ok(());
        };
        let poller = EventPoller::new(self.video.clone(), sink, self.config.poll_interval());
        *self.poller.lock() = Some(poller.spawn()?);
        Ok(())
    }
}

impl Drop for Sdl {
    fn drop(&mut self) {
        let Some(handle) = self.poller.get_mut().take() else {
            LIVE.store(false, Ordering::Release);
            return;
        };

        if !self.thread().is_owner_thread() {
            join_poller(handle);
            LIVE.store(false, Ordering::Release);
            return;
        }

        // A poll in flight waits on this thread; the slot stays taken until the poller is gone.
        let reaper = thread::Builder::new()
            .name("sdl-poll-reaper".to_string())
            .spawn(move || {
                join_poller(handle);
                LIVE.store(false, Ordering::Release);
            });
        if let Err(e) = reaper {
            warn!(target: "sdl", "poller.reap spawn failed err={e}");
            LIVE.store(false, Ordering::Release);
        }
    }
}

fn join_poller(handle: PollerHandle) -> Option<PollExit> {
    match handle.stop() {
        Ok(exit) => {
            info!(target: "sdl", "poller.joined exit={exit:?}");
            Some(exit)
        }
        Err(_) => {
            warn!(target: "sdl", "poller thread panicked");
            None
        }
    }
}

/// Run `init`; when video init fails and the user left `SDL_VIDEODRIVER` unset, retry
/// once with `fallback` and unset it again if that fails too.
fn with_driver_fallback(
    flags: InitFlags,
    fallback: Option<&str>,
    init: impl Fn() -> i32,
    native: &dyn NativeLayer,
) -> Result<(), (i32, String)> {
    let mut code = init();

    if code != 0 && flags.contains(InitFlags::VIDEO) && env::var_os(VIDEO_DRIVER_VAR).is_none() {
        if let Some(driver) = fallback {
            warn!(target: "sdl", "init.retry {}={}", VIDEO_DRIVER_VAR, driver);
            env::set_var(VIDEO_DRIVER_VAR, driver);
            code = init();
            if code != 0 {
                env::remove_var(VIDEO_DRIVER_VAR);
            }
        }
    }

    if code != 0 {
        return Err((code, native.error()));
    }
    Ok(())
}
