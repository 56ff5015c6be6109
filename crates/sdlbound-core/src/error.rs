use thiserror::Error;

pub type SdlResult<T> = Result<T, SdlError>;

/// Misuse of a [`ThreadBound`](crate::thread::ThreadBound) executor.
#[derive(Debug, Error)]
pub enum BoundError {
    #[error("thread-bound executor is closed")]
    Closed,

    #[error("thread-bound executor already has an owner thread")]
    AlreadyBound,

    #[error("owner thread went away before the work item completed")]
    Disconnected,

    #[error("failed to spawn owner thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Crate-wide error.
#[derive(Debug, Error)]
pub enum SdlError {
    #[error(transparent)]
    Bound(#[from] BoundError),

    #[error("{op} failed with status {code}: {message}")]
    Native {
        op: &'static str,
        code: i32,
        message: String,
    },

    #[error("{op} returned no surface: {message}")]
    NoSurface { op: &'static str, message: String },

    #[error("surface has been freed")]
    SurfaceFreed,

    #[error("an sdl context is already live in this process")]
    AlreadyRunning,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
