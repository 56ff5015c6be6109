use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::warn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::StreamPolicy;
use crate::event::Event;

/// All readers are gone; nothing will ever consume another event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamClosed;

/// Outcome of [`EventSink::publish_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the channel (or counted as dropped under `drop_newest`).
    Accepted,
    /// The halt signal fired while the send was parked; the event was discarded.
    Halted,
}

/// Create the one-writer event channel with an explicit buffering policy.
pub fn channel(policy: StreamPolicy) -> (EventSink, EventStream) {
    let (tx, rx) = match policy {
        StreamPolicy::Blocking { capacity } | StreamPolicy::DropNewest { capacity } => {
            bounded(capacity)
        }
        StreamPolicy::Unbounded => unbounded(),
    };
    let dropped = Arc::new(AtomicU64::new(0));

    (
        EventSink {
            tx,
            policy,
            dropped: dropped.clone(),
        },
        EventStream { rx, dropped },
    )
}

/// Writer side. Owned by the poller; not cloneable, so there is exactly one writer.
pub struct EventSink {
    tx: Sender<Event>,
    policy: StreamPolicy,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Deliver one event according to the buffering policy.
    ///
    /// Blocking policies stall the caller until a reader makes room.
    pub fn publish(&self, ev: Event) -> Result<(), StreamClosed> {
        match self.policy {
            StreamPolicy::DropNewest { .. } => match self.tx.try_send(ev) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(ev)) => {
                    let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if n.is_power_of_two() {
                        warn!(target: "poll", "stream.drop kind={} dropped_total={}", ev.name(), n);
                    }
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err(StreamClosed),
            },
            StreamPolicy::Blocking { .. } | StreamPolicy::Unbounded => {
                self.tx.send(ev).map_err(|_| StreamClosed)
            }
        }
    }

    /// Like [`publish`](Self::publish), but a parked send gives up once `halt`
    /// disconnects or receives a message.
    pub fn publish_until(&self, ev: Event, halt: &Receiver<()>) -> Result<Delivery, StreamClosed> {
        if let StreamPolicy::DropNewest { .. } = self.policy {
            return self.publish(ev).map(|()| Delivery::Accepted);
        }
        select! {
            send(self.tx, ev) -> res => res.map(|()| Delivery::Accepted).map_err(|_| StreamClosed),
            recv(halt) -> _ => Ok(Delivery::Halted),
        }
    }
}

/// Reader side: the ordered sequence of decoded events.
///
/// Clones share one queue; each event goes to exactly one reader.
#[derive(Clone)]
pub struct EventStream {
    rx: Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventStream {
    /// Block for the next event. `None` once the writer is gone and the buffer is empty.
    #[inline]
    pub fn recv(&self) -> Option<Event> {
        self.rx.recv().ok()
    }

    #[inline]
    pub fn try_recv(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.rx.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Underlying receiver, for `crossbeam_channel::select!`.
    #[inline]
    pub fn receiver(&self) -> &Receiver<Event> {
        &self.rx
    }

    /// Events discarded by a `drop_newest` policy so far.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ResizeEvent;
    use std::thread;

    fn resize(w: i32) -> Event {
        Event::Resize(ResizeEvent { w, h: 1 })
    }

    #[test]
    fn drop_newest_never_blocks_and_counts() {
        let (sink, stream) = channel(StreamPolicy::DropNewest { capacity: 2 });
        for w in 0..5 {
            sink.publish(resize(w)).unwrap();
        }
        assert_eq!(stream.dropped(), 3);
        assert_eq!(stream.try_recv(), Some(resize(0)));
        assert_eq!(stream.try_recv(), Some(resize(1)));
        assert_eq!(stream.try_recv(), None);
    }

    #[test]
    fn unbounded_keeps_everything_in_order() {
        let (sink, stream) = channel(StreamPolicy::Unbounded);
        for w in 0..100 {
            sink.publish(resize(w)).unwrap();
        }
        let got: Vec<_> = (0..100).filter_map(|_| stream.try_recv()).collect();
        assert_eq!(got, (0..100).map(resize).collect::<Vec<_>>());
        assert_eq!(stream.dropped(), 0);
    }

    #[test]
    fn rendezvous_waits_for_a_reader() {
        let (sink, stream) = channel(StreamPolicy::default());
        assert!(sink.tx.try_send(resize(1)).is_err());

        let writer = thread::spawn(move || sink.publish(resize(2)));
        assert_eq!(stream.recv(), Some(resize(2)));
        assert_eq!(writer.join().unwrap(), Ok(()));
    }

    #[test]
    fn parked_send_gives_up_on_halt() {
        let (sink, stream) = channel(StreamPolicy::default());
        let (halt_tx, halt_rx) = bounded::<()>(0);

        let writer = thread::spawn(move || sink.publish_until(resize(3), &halt_rx));
        thread::sleep(Duration::from_millis(20));
        drop(halt_tx);

        assert_eq!(writer.join().unwrap(), Ok(Delivery::Halted));
        assert_eq!(stream.try_recv(), None);
    }

    #[test]
    fn publish_until_delivers_when_not_halted() {
        let (sink, stream) = channel(StreamPolicy::Blocking { capacity: 1 });
        let halt = crossbeam_channel::never::<()>();
        assert_eq!(sink.publish_until(resize(4), &halt), Ok(Delivery::Accepted));
        assert_eq!(stream.try_recv(), Some(resize(4)));
    }

    #[test]
    fn publish_fails_once_readers_are_gone() {
        let (sink, stream) = channel(StreamPolicy::Unbounded);
        drop(stream);
        assert_eq!(sink.publish(Event::Quit), Err(StreamClosed));
    }

    #[test]
    fn recv_ends_when_writer_is_gone() {
        let (sink, stream) = channel(StreamPolicy::Unbounded);
        sink.publish(Event::Quit).unwrap();
        drop(sink);
        assert_eq!(stream.recv(), Some(Event::Quit));
        assert_eq!(stream.recv(), None);
    }
}
