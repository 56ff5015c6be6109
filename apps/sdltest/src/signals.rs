use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request shared by the frame loop and the input script.
#[derive(Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    /// A signal that Ctrl-C also raises.
    pub fn with_ctrl_c() -> anyhow::Result<Self> {
        let signal = Self::default();
        let requested = signal.requested.clone();
        ctrlc::set_handler(move || {
            info!(target: "sdl", "ctrl-c");
            requested.store(true, Ordering::Relaxed);
        })?;
        Ok(signal)
    }

    #[inline]
    pub fn request(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }
}
