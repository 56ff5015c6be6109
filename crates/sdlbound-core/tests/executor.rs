use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use sdlbound_core::{Affinity, BoundError, ThreadBound, UnboundPolicy};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn concurrent_submitters_never_overlap_and_stay_on_owner() {
    init_logs();
    let tb = ThreadBound::new();
    let owner = tb.spawn_owner("test-owner").unwrap();
    let owner_id = owner.thread_id();
    assert_eq!(tb.state(), Affinity::Bound(owner_id));

    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(8));

    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let tb = tb.clone();
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for _ in 0..25 {
                    let in_flight = in_flight.clone();
                    let max_seen = max_seen.clone();
                    let ran_on = tb
                        .run(move || {
                            let n = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(n, Ordering::SeqCst);
                            thread::sleep(Duration::from_micros(50));
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            thread::current().id()
                        })
                        .unwrap();
                    assert_eq!(ran_on, owner_id);
                }
            })
        })
        .collect();

    for s in submitters {
        s.join().unwrap();
    }
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);

    tb.close();
    owner.join().unwrap();
    assert_eq!(tb.state(), Affinity::Closed);
}

#[test]
fn items_from_one_submitter_run_in_submission_order() {
    let tb = ThreadBound::new();
    let owner = tb.spawn_owner("test-owner").unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100 {
        let log = log.clone();
        tb.run(move || log.lock().push(i)).unwrap();
    }
    assert_eq!(*log.lock(), (0..100).collect::<Vec<_>>());

    tb.close();
    owner.join().unwrap();
}

#[test]
fn drain_after_close_runs_exactly_the_queued_items() {
    init_logs();
    let tb = ThreadBound::with_policy(UnboundPolicy::Queue);
    let executed = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..6)
        .map(|_| {
            let tb = tb.clone();
            let executed = executed.clone();
            thread::spawn(move || {
                tb.run(move || {
                    executed.fetch_add(1, Ordering::SeqCst);
                })
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    tb.close();
    assert_eq!(tb.state(), Affinity::Closed);

    tb.drain().unwrap();

    let accepted = submitters
        .into_iter()
        .map(|s| s.join().unwrap())
        .filter(|r| match r {
            Ok(()) => true,
            Err(BoundError::Closed) => false,
            Err(e) => panic!("unexpected {e}"),
        })
        .count();
    assert_eq!(executed.load(Ordering::SeqCst), accepted);

    assert!(matches!(tb.run(|| ()), Err(BoundError::Closed)));
}

#[test]
fn owner_survives_a_panicking_item() {
    let tb = ThreadBound::new();
    let owner = tb.spawn_owner("test-owner").unwrap();

    let caught = panic::catch_unwind(AssertUnwindSafe(|| tb.run(|| -> u8 { panic!("bad item") })));
    assert!(caught.is_err());

    assert_eq!(tb.run(|| 7).unwrap(), 7);
    assert!(!owner.is_finished());

    tb.close();
    owner.join().unwrap();
}

#[test]
fn nested_run_from_owner_does_not_deadlock() {
    let tb = ThreadBound::new();
    let owner = tb.spawn_owner("test-owner").unwrap();

    let inner = tb.clone();
    let depth = tb
        .run(move || inner.run(|| thread::current().id()).unwrap())
        .unwrap();
    assert_eq!(depth, owner.thread_id());

    tb.close();
    owner.join().unwrap();
}
