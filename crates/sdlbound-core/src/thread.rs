use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::debug;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crate::config::UnboundPolicy;
use crate::error::BoundError;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Work(Job),
    Close,
}

/// Observable lifecycle of a [`ThreadBound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Unbound,
    Bound(ThreadId),
    Closed,
}

struct Lifecycle {
    owner: Option<ThreadId>,
    draining: bool,
    closed: bool,
}

struct Inner {
    tx: Sender<Message>,
    rx: Receiver<Message>,
    life: Mutex<Lifecycle>,
    policy: UnboundPolicy,
}

/// Queue of work items executed by one and only one OS thread.
///
/// Producer side: any thread calls [`run`](Self::run) and blocks until its item finished.
/// Consumer side: exactly one thread calls [`drain`](Self::drain) and becomes the owner.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct ThreadBound {
    inner: Arc<Inner>,
}

impl Default for ThreadBound {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadBound {
    #[inline]
    pub fn new() -> Self {
        Self::with_policy(UnboundPolicy::Inline)
    }

    pub fn with_policy(policy: UnboundPolicy) -> Self {
        let (tx, rx) = unbounded();
        Self {
            inner: Arc::new(Inner {
                tx,
                rx,
                life: Mutex::new(Lifecycle {
                    owner: None,
                    draining: false,
                    closed: false,
                }),
                policy,
            }),
        }
    }

    pub fn state(&self) -> Affinity {
        let life = self.inner.life.lock();
        if life.closed {
            Affinity::Closed
        } else if let Some(id) = life.owner {
            Affinity::Bound(id)
        } else {
            Affinity::Unbound
        }
    }

    #[inline]
    pub fn is_owner_thread(&self) -> bool {
        self.inner.life.lock().owner == Some(thread::current().id())
    }

    /// Execute `work` on the owner thread and wait for its result.
    ///
    /// - Unbound with [`UnboundPolicy::Inline`]: runs on the calling thread.
    /// - Called from the owner thread while it drains: runs inline.
    /// - Closed: `Err(BoundError::Closed)`, `work` is dropped unexecuted.
    ///
    /// A panic inside `work` is re-raised here; the owner thread keeps draining.
    pub fn run<F, R>(&self, work: F) -> Result<R, BoundError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let me = thread::current().id();
        let (reply_tx, reply_rx) = bounded::<thread::Result<R>>(1);

        {
            let life = self.inner.life.lock();

            if life.draining && life.owner == Some(me) {
                drop(life);
                return Ok(work());
            }
            if life.closed {
                return Err(BoundError::Closed);
            }
            if life.owner.is_none() && self.inner.policy == UnboundPolicy::Inline {
                drop(life);
                return Ok(work());
            }

            let job: Job = Box::new(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(work));
                let _ = reply_tx.send(result);
            });

            // Enqueue under the lifecycle lock so nothing lands behind the close marker.
            self.inner
                .tx
                .send(Message::Work(job))
                .map_err(|_| BoundError::Disconnected)?;
        }

        match reply_rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => Err(BoundError::Disconnected),
        }
    }

    /// Turn the calling thread into the owner and execute queued work until closed.
    ///
    /// Returns once [`close`](Self::close) was called and every item queued before it ran.
    pub fn drain(&self) -> Result<(), BoundError> {
        self.claim()?;
        self.pump();
        Ok(())
    }

    /// Signal that no more work will be submitted.
    ///
    /// Items already queued still execute. Idempotent.
    pub fn close(&self) {
        let mut life = self.inner.life.lock();
        if life.closed {
            return;
        }
        life.closed = true;
        let _ = self.inner.tx.send(Message::Close);
        debug!(target: "bound", "close owner={:?}", life.owner);
    }

    /// Spawn a named OS thread that drains this executor.
    ///
    /// Returns after the thread is bound, so `run` issued afterwards never takes the unbound path.
    pub fn spawn_owner(&self, name: &str) -> Result<OwnerThread, BoundError> {
        let (ready_tx, ready_rx) = bounded::<Result<(), BoundError>>(1);
        let tb = self.clone();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let claimed = tb.claim();
                let ok = claimed.is_ok();
                let _ = ready_tx.send(claimed);
                if ok {
                    tb.pump();
                }
            })
            .map_err(BoundError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(OwnerThread { handle }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(BoundError::Disconnected),
        }
    }

    fn claim(&self) -> Result<(), BoundError> {
        let me = thread::current().id();
        let mut life = self.inner.life.lock();
        if life.owner.is_some() {
            return Err(BoundError::AlreadyBound);
        }
        life.owner = Some(me);
        life.draining = true;
        debug!(target: "bound", "drain.start thread={:?}", me);
        Ok(())
    }

    fn pump(&self) {
        let mut executed = 0u64;

        while let Ok(msg) = self.inner.rx.recv() {
            match msg {
                Message::Work(job) => {
                    job();
                    executed += 1;
                }
                Message::Close => break,
            }
        }

        self.inner.life.lock().draining = false;
        debug!(target: "bound", "drain.stop executed={}", executed);
    }
}

/// Join handle of a thread started by [`ThreadBound::spawn_owner`].
pub struct OwnerThread {
    handle: JoinHandle<()>,
}

impl OwnerThread {
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}
