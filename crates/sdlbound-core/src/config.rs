use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::error::{SdlError, SdlResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdlConfig {
    /// Sleep between empty poll bursts.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub stream: StreamPolicy,

    #[serde(default)]
    pub unbound: UnboundPolicy,

    #[serde(default = "default_owner_thread_name")]
    pub owner_thread_name: String,

    /// `SDL_VIDEODRIVER` value tried once when video init fails and the
    /// variable is not set by the user.
    #[serde(default = "default_video_driver_fallback")]
    pub video_driver_fallback: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Buffering between the poller and the readers of the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum StreamPolicy {
    /// Poller blocks while the buffer is full. `capacity = 0` is a rendezvous:
    /// every event waits for a reader.
    Blocking {
        #[serde(default)]
        capacity: usize,
    },
    /// Poller never blocks; events that do not fit are dropped and counted.
    DropNewest { capacity: usize },
    Unbounded,
}

impl Default for StreamPolicy {
    fn default() -> Self {
        StreamPolicy::Blocking { capacity: 0 }
    }
}

/// What `ThreadBound::run` does before any thread started draining.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnboundPolicy {
    /// Execute on the calling thread. No affinity is enforced.
    #[default]
    Inline,
    /// Queue the work and wait for an owner thread to appear.
    Queue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// env_logger filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5
}
fn default_owner_thread_name() -> String {
    "sdl-owner".to_string()
}
fn default_video_driver_fallback() -> Option<String> {
    if cfg!(target_os = "macos") {
        Some("x11".to_string())
    } else {
        None
    }
}
fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for SdlConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stream: StreamPolicy::default(),
            unbound: UnboundPolicy::default(),
            owner_thread_name: default_owner_thread_name(),
            video_driver_fallback: default_video_driver_fallback(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SdlConfig {
    pub fn load_or_default(path: impl AsRef<Path>) -> SdlResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s)
                .map_err(|e| SdlError::Config(format!("parse {}: {}", path.display(), e))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(SdlError::Io(e)),
        }
    }

    pub fn from_toml_str(s: &str) -> SdlResult<Self> {
        toml::from_str(s).map_err(|e| SdlError::Config(e.to_string()))
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
