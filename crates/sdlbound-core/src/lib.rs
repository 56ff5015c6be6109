pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod input;
pub mod native;
pub mod poll;
pub mod stream;
pub mod thread;
pub mod video;

pub use crate::config::{SdlConfig, StreamPolicy, UnboundPolicy};
pub use crate::context::{Sdl, BINDINGS_VERSION};
pub use crate::error::{BoundError, SdlError, SdlResult};
pub use crate::event::Event;
pub use crate::input::{KeyRepeat, KeyState, MouseState};
pub use crate::native::{HeadlessNative, InitFlags, NativeLayer, Rect, VideoFlags};
pub use crate::poll::{EventPoller, PollExit, PollerHandle};
pub use crate::stream::EventStream;
pub use crate::thread::{Affinity, OwnerThread, ThreadBound};
pub use crate::video::{GlobalGuard, Surface, Video};
