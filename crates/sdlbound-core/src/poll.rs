use crossbeam_channel::{bounded, never, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, info, trace};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{BoundError, SdlError, SdlResult};
use crate::event::{kind, RawEvent};
use crate::stream::{Delivery, EventSink};
use crate::thread::Affinity;
use crate::video::Video;

/// Why the poller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    /// The executor was closed or its owner thread went away.
    ExecutorClosed,
    /// Every reader of the event stream was dropped.
    StreamClosed,
    /// [`PollerHandle::stop`] was called while the executor was still open.
    Stopped,
}

/// Drains the native event queue on the owner thread and publishes decoded events.
///
/// One poll is one work item, so the owner thread is never monopolized: other
/// submitted work interleaves between polls.
pub struct EventPoller {
    video: Video,
    sink: EventSink,
    interval: Duration,
}

impl EventPoller {
    pub fn new(video: Video, sink: EventSink, interval: Duration) -> Self {
        Self {
            video,
            sink,
            interval,
        }
    }

    /// Fetch one native event. A resize refreshes the current surface before the
    /// global lock is released.
    fn poll_once(&self) -> Result<Option<RawEvent>, BoundError> {
        let shared = self.video.shared().clone();
        self.video.thread().run(move || {
            let mut g = shared.global.lock();
            let raw = shared.native.poll_event()?;
            if raw.discriminant() == kind::VIDEORESIZE {
                g.refresh_current(&*shared.native);
            }
            Some(raw)
        })
    }

    /// Poll until the executor closes or the stream loses its readers.
    ///
    /// Each burst drains everything pending, then the loop sleeps for the interval.
    pub fn run(self) -> PollExit {
        self.run_until(&never())
    }

    /// [`run`](Self::run) that also stops once `halt` disconnects. The halt is
    /// checked before every poll, so no native event is taken after it fired.
    fn run_until(self, halt: &Receiver<()>) -> PollExit {
        info!(target: "poll", "poller.start interval_ms={}", self.interval.as_millis());
        let mut published: u64 = 0;

        loop {
            loop {
                if halted(halt) {
                    return self.halted_exit(published);
                }

                let raw = match self.poll_once() {
                    Ok(Some(raw)) => raw,
                    Ok(None) => break,
                    Err(e) => {
                        info!(target: "poll", "poller.stop reason=executor published={published} err={e}");
                        return PollExit::ExecutorClosed;
                    }
                };

                let Some(ev) = raw.decode() else {
                    trace!(target: "poll", "event.skip kind={}", raw.discriminant());
                    continue;
                };

                trace!(target: "poll", "event.publish kind={}", ev.name());
                match self.sink.publish_until(ev, halt) {
                    Ok(Delivery::Accepted) => published += 1,
                    Ok(Delivery::Halted) => {
                        debug!(target: "poll", "event.discard kind={} reason=halt", ev.name());
                        return self.halted_exit(published);
                    }
                    Err(_) => {
                        info!(target: "poll", "poller.stop reason=stream published={published}");
                        return PollExit::StreamClosed;
                    }
                }
            }

            match halt.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return self.halted_exit(published),
            }
        }
    }

    fn halted_exit(&self, published: u64) -> PollExit {
        if self.video.thread().state() == Affinity::Closed {
            info!(target: "poll", "poller.stop reason=executor published={published}");
            return PollExit::ExecutorClosed;
        }
        info!(target: "poll", "poller.stop reason=halt published={published}");
        PollExit::Stopped
    }

    /// Run the poller on its own named thread.
    pub fn spawn(self) -> SdlResult<PollerHandle> {
        let (halt_tx, halt_rx) = bounded::<()>(0);
        let join = thread::Builder::new()
            .name("sdl-poll".to_string())
            .spawn(move || self.run_until(&halt_rx))
            .map_err(SdlError::Io)?;
        debug!(target: "poll", "poller.spawned");
        Ok(PollerHandle { join, halt: halt_tx })
    }
}

fn halted(halt: &Receiver<()>) -> bool {
    !matches!(halt.try_recv(), Err(TryRecvError::Empty))
}

pub struct PollerHandle {
    join: JoinHandle<PollExit>,
    halt: Sender<()>,
}

impl PollerHandle {
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the poller to stop on its own.
    pub fn join(self) -> thread::Result<PollExit> {
        self.join.join()
    }

    /// Halt the poller and wait for it. A poll in flight finishes first; an event
    /// parked in a blocking send is discarded.
    pub fn stop(self) -> thread::Result<PollExit> {
        drop(self.halt);
        self.join.join()
    }
}
