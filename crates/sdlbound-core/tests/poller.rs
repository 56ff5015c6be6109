use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sdlbound_core::event::{
    ButtonState, Key, KeyboardEvent, Keysym, Mod, MouseMotionEvent, RawEvent, ResizeEvent,
    RAW_EVENT_SIZE,
};
use sdlbound_core::native::InitFlags;
use sdlbound_core::stream::{self, EventStream};
use sdlbound_core::{
    Event, EventPoller, HeadlessNative, NativeLayer, OwnerThread, PollerHandle, StreamPolicy,
    ThreadBound, Video, VideoFlags,
};

const INTERVAL: Duration = Duration::from_millis(1);
const WAIT: Duration = Duration::from_secs(5);

struct Rig {
    native: Arc<HeadlessNative>,
    tb: ThreadBound,
    owner: OwnerThread,
    video: Video,
    stream: EventStream,
    poller: PollerHandle,
}

impl Rig {
    fn start(policy: StreamPolicy, setup: impl FnOnce(&HeadlessNative, &Video)) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let native = Arc::new(HeadlessNative::new());
        let tb = ThreadBound::new();
        let owner = tb.spawn_owner("test-owner").unwrap();
        let video = Video::new(native.clone(), tb.clone());
        setup(&native, &video);

        let (sink, stream) = stream::channel(policy);
        let poller = EventPoller::new(video.clone(), sink, INTERVAL).spawn().unwrap();

        Self {
            native,
            tb,
            owner,
            video,
            stream,
            poller,
        }
    }

    fn stop(self) {
        self.tb.close();
        drop(self.stream);
        self.poller.join().unwrap();
        self.owner.join().unwrap();
    }
}

fn motion(x: u16) -> Event {
    Event::MouseMotion(MouseMotionEvent {
        which: 0,
        buttons: 0,
        x,
        y: 1,
        xrel: 1,
        yrel: 0,
    })
}

fn key(sym: Key) -> Event {
    Event::Keyboard(KeyboardEvent {
        which: 0,
        state: ButtonState::Pressed,
        keysym: Keysym {
            scancode: 9,
            sym,
            modifiers: Mod::LSHIFT,
            unicode: 0,
        },
    })
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn events_arrive_in_native_order() {
    let rig = Rig::start(StreamPolicy::Unbounded, |native, _| {
        for x in 0..200 {
            native.push_event(&motion(x));
        }
    });

    for x in 0..200 {
        assert_eq!(rig.stream.recv_timeout(WAIT), Some(motion(x)));
    }
    rig.stop();
}

#[test]
fn quit_is_just_another_event() {
    let rig = Rig::start(StreamPolicy::default(), |native, _| {
        native.push_event(&Event::Quit);
        native.push_event(&key(Key::ESCAPE));
    });

    assert_eq!(rig.stream.recv_timeout(WAIT), Some(Event::Quit));
    assert_eq!(rig.stream.recv_timeout(WAIT), Some(key(Key::ESCAPE)));

    rig.native.push_event(&key(Key::SPACE));
    assert_eq!(rig.stream.recv_timeout(WAIT), Some(key(Key::SPACE)));
    assert!(!rig.poller.is_finished());
    rig.stop();
}

#[test]
fn resize_is_visible_on_the_surface_when_the_event_is_received() {
    let rig = Rig::start(StreamPolicy::default(), |native, _| {
        assert_eq!(native.init(InitFlags::VIDEO), 0);
    });

    let screen = rig
        .video
        .set_video_mode(640, 480, 32, VideoFlags::RESIZABLE)
        .unwrap();
    assert_eq!(screen.size().unwrap(), (640, 480));

    rig.native.push_event(&Event::Resize(ResizeEvent { w: 800, h: 600 }));
    let ev = rig.stream.recv_timeout(WAIT);
    assert_eq!(ev, Some(Event::Resize(ResizeEvent { w: 800, h: 600 })));
    assert_eq!(screen.size().unwrap(), (800, 600));
    assert_eq!(rig.video.lock_global().current_size(), Some((800, 600)));

    drop(screen);
    rig.stop();
}

#[test]
fn unknown_kinds_are_dropped_without_stopping() {
    let rig = Rig::start(StreamPolicy::Unbounded, |native, _| {
        let mut user = [0u8; RAW_EVENT_SIZE];
        user[0] = sdlbound_core::event::kind::USEREVENT;
        native.push_raw(RawEvent::from_bytes(user));
        let mut bogus = [0u8; RAW_EVENT_SIZE];
        bogus[0] = 200;
        native.push_raw(RawEvent::from_bytes(bogus));
        native.push_event(&Event::Quit);
    });

    assert_eq!(rig.stream.recv_timeout(WAIT), Some(Event::Quit));
    assert_eq!(rig.stream.recv_timeout(Duration::from_millis(30)), None);
    assert!(!rig.poller.is_finished());
    rig.stop();
}

#[test]
fn polling_only_happens_on_the_owner_thread() {
    let rig = Rig::start(StreamPolicy::Unbounded, |native, _| {
        native.push_event(&Event::Quit);
    });
    assert_eq!(rig.stream.recv_timeout(WAIT), Some(Event::Quit));

    assert_eq!(rig.native.threads_for("poll_event"), vec![rig.owner.thread_id()]);
    rig.stop();
}

#[test]
fn rendezvous_stream_stalls_polling_until_read() {
    let rig = Rig::start(StreamPolicy::Blocking { capacity: 0 }, |native, _| {
        for x in 0..3 {
            native.push_event(&motion(x));
        }
    });

    // First event is taken off the native queue, then the poller waits for a reader.
    assert!(wait_until(|| rig.native.pending_events() == 2));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(rig.native.pending_events(), 2);

    assert_eq!(rig.stream.recv_timeout(WAIT), Some(motion(0)));
    assert_eq!(rig.stream.recv_timeout(WAIT), Some(motion(1)));
    assert_eq!(rig.stream.recv_timeout(WAIT), Some(motion(2)));
    rig.stop();
}

#[test]
fn drop_newest_stream_keeps_polling_and_counts() {
    let rig = Rig::start(StreamPolicy::DropNewest { capacity: 1 }, |native, _| {
        for x in 0..5 {
            native.push_event(&motion(x));
        }
    });

    assert!(wait_until(|| rig.stream.dropped() == 4));
    assert_eq!(rig.native.pending_events(), 0);
    assert_eq!(rig.stream.try_recv(), Some(motion(0)));
    rig.stop();
}

#[test]
fn poller_exits_once_the_executor_is_closed() {
    let rig = Rig::start(StreamPolicy::Unbounded, |_, _| {});
    rig.tb.close();
    assert!(wait_until(|| rig.poller.is_finished()));
    rig.stop();
}
