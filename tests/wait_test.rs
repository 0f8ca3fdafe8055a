/*!
 * Wait Tests
 * Sleep/wakeup ordering, wait queue lifecycle, and join delivery
 */

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use uthread::{JoinPolicy, Runtime, Target, ThreadError, Tid};

fn runtime(policy: JoinPolicy) -> Runtime {
    Runtime::builder()
        .with_max_threads(16)
        .with_join_policy(policy)
        .build()
        .unwrap()
}

#[test]
fn test_wakeups_are_fifo() {
    let rt = runtime(JoinPolicy::FirstWaiter);
    let order = Arc::new(Mutex::new(Vec::new()));

    let (inner, out) = (rt.clone(), order.clone());
    rt.run(move || {
        let queue = inner.wait_queue();
        for _ in 0..4 {
            let (rt2, q, out2) = (inner.clone(), queue.clone(), out.clone());
            inner
                .spawn(move || {
                    let _ = rt2.sleep(&q);
                    out2.lock().push(rt2.current().unwrap());
                })
                .unwrap();
        }

        // Every worker runs and blocks in creation order
        inner.yield_to(Target::Any).unwrap();
        assert_eq!(queue.waiters(), vec![Tid(1), Tid(2), Tid(3), Tid(4)]);

        for _ in 0..4 {
            assert_eq!(inner.wake_one(&queue), Ok(true));
            inner.yield_to(Target::Any).unwrap();
        }
        assert_eq!(inner.wake_one(&queue), Ok(false));
    })
    .unwrap();

    assert_eq!(*order.lock(), vec![Tid(1), Tid(2), Tid(3), Tid(4)]);
}

#[test]
fn test_wake_all_counts_live_waiters() {
    let rt = runtime(JoinPolicy::FirstWaiter);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (inner, res) = (rt.clone(), results.clone());
    rt.run(move || {
        let queue = inner.wait_queue();
        for _ in 0..3 {
            let (rt2, q) = (inner.clone(), queue.clone());
            inner.spawn(move || {
                let _ = rt2.sleep(&q);
            })
            .unwrap();
        }
        inner.yield_to(Target::Any).unwrap();

        // A kill-flagged waiter leaves the queue but is not counted
        inner.kill(Tid(2)).unwrap();
        res.lock().push(inner.wake_all(&queue));
        res.lock().push(Ok(queue.len()));
        res.lock().push(Ok(inner.runnable()));
    })
    .unwrap();

    assert_eq!(*results.lock(), vec![Ok(2), Ok(0), Ok(4)]);
}

#[test]
fn test_sleep_with_nothing_ready() {
    let rt = runtime(JoinPolicy::FirstWaiter);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (inner, res) = (rt.clone(), results.clone());
    rt.run(move || {
        let queue = inner.wait_queue();
        let slept = inner.sleep(&queue);
        res.lock().push(format!("{slept:?} waiters={}", queue.len()));
    })
    .unwrap();

    assert_eq!(*results.lock(), vec!["Err(NoneReady) waiters=0"]);
}

#[test]
fn test_invalid_queues_rejected() {
    let rt = runtime(JoinPolicy::FirstWaiter);
    let other = runtime(JoinPolicy::FirstWaiter);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (inner, res) = (rt.clone(), results.clone());
    rt.run(move || {
        inner.spawn(|| {}).unwrap();

        let foreign = other.wait_queue();
        let r = inner.sleep(&foreign).map(|_| ());
        res.lock().push(r);
        res.lock().push(inner.wake_one(&foreign).map(|_| ()));

        let destroyed = inner.wait_queue();
        res.lock().push(inner.destroy_wait_queue(&destroyed));
        let r = inner.sleep(&destroyed).map(|_| ());
        res.lock().push(r);
        res.lock().push(inner.destroy_wait_queue(&destroyed));
    })
    .unwrap();

    assert_eq!(
        *results.lock(),
        vec![
            Err(ThreadError::InvalidQueue),
            Err(ThreadError::InvalidQueue),
            Ok(()),
            Err(ThreadError::InvalidQueue),
            Err(ThreadError::InvalidQueue),
        ]
    );
}

#[test]
fn test_destroy_busy_queue() {
    let rt = runtime(JoinPolicy::FirstWaiter);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (inner, res) = (rt.clone(), results.clone());
    rt.run(move || {
        let queue = inner.wait_queue();
        let (rt2, q) = (inner.clone(), queue.clone());
        inner.spawn(move || {
            let _ = rt2.sleep(&q);
        })
        .unwrap();
        inner.yield_to(Target::Any).unwrap();

        res.lock().push(inner.destroy_wait_queue(&queue));
        inner.wake_one(&queue).unwrap();
        res.lock().push(inner.destroy_wait_queue(&queue));
    })
    .unwrap();

    assert_eq!(*results.lock(), vec![Err(ThreadError::Busy), Ok(())]);
}

#[test]
fn test_join_returns_exit_code() {
    let rt = runtime(JoinPolicy::FirstWaiter);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (inner, res) = (rt.clone(), results.clone());
    rt.run(move || {
        let rt2 = inner.clone();
        let worker = inner
            .spawn(move || {
                let _ = rt2.exit(7);
            })
            .unwrap();
        let r = inner.join(worker);
        res.lock().push(r);

        // Exited threads are no longer joinable
        let r = inner.join(worker);
        res.lock().push(r);
        let r = inner.join(Tid::ROOT);
        res.lock().push(r);
        let r = inner.join(Tid(500));
        res.lock().push(r);
    })
    .unwrap();

    assert_eq!(
        *results.lock(),
        vec![
            Ok((Tid(1), 7)),
            Err(ThreadError::InvalidThread(Tid(1))),
            Err(ThreadError::InvalidThread(Tid::ROOT)),
            Err(ThreadError::InvalidThread(Tid(500))),
        ]
    );
}

/// Two joiners block on one worker, which then exits with 5
fn two_joiners(policy: JoinPolicy) -> Vec<Result<(Tid, i32), ThreadError>> {
    let rt = runtime(policy);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (inner, res) = (rt.clone(), results.clone());
    rt.run(move || {
        let rt_w = inner.clone();
        let worker = inner
            .spawn(move || {
                let _ = rt_w.yield_to(Target::Any);
                let _ = rt_w.exit(5);
            })
            .unwrap();

        for _ in 0..2 {
            let (rt_j, res_j) = (inner.clone(), res.clone());
            inner
                .spawn(move || {
                    let joined = rt_j.join(worker);
                    res_j.lock().push(joined);
                })
                .unwrap();
        }

        // Worker yields, both joiners block, then everything drains
        while inner.yield_to(Target::Any).is_ok() {}
    })
    .unwrap();

    let results = results.lock().clone();
    results
}

#[test]
fn test_join_first_waiter_policy() {
    assert_eq!(
        two_joiners(JoinPolicy::FirstWaiter),
        vec![Ok((Tid(1), 5)), Err(ThreadError::InvalidThread(Tid(1)))]
    );
}

#[test]
fn test_join_all_waiters_policy() {
    assert_eq!(
        two_joiners(JoinPolicy::AllWaiters),
        vec![Ok((Tid(1), 5)), Ok((Tid(1), 5))]
    );
}

#[test]
fn test_killed_joiner_skipped_for_delivery() {
    let rt = runtime(JoinPolicy::FirstWaiter);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (inner, res) = (rt.clone(), results.clone());
    rt.run(move || {
        let rt_w = inner.clone();
        let worker = inner
            .spawn(move || {
                let _ = rt_w.yield_to(Target::Any);
                let _ = rt_w.exit(11);
            })
            .unwrap();

        let mut joiners = Vec::new();
        for _ in 0..2 {
            let (rt_j, res_j) = (inner.clone(), res.clone());
            joiners.push(
                inner
                    .spawn(move || {
                        let joined = rt_j.join(worker);
                        res_j.lock().push(joined);
                    })
                    .unwrap(),
            );
        }

        // Worker yields back; both joiners are now blocked in join
        inner.yield_to(Target::Any).unwrap();
        inner.kill(joiners[0]).unwrap();

        while inner.yield_to(Target::Any).is_ok() {}
    })
    .unwrap();

    // The killed joiner never returns from join; the other gets the code
    assert_eq!(*results.lock(), vec![Ok((Tid(1), 11))]);
}

#[test]
fn test_join_without_ready_thread_fails() {
    let rt = runtime(JoinPolicy::FirstWaiter);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (inner, res) = (rt.clone(), results.clone());
    rt.run(move || {
        let queue = inner.wait_queue();
        let (rt2, q) = (inner.clone(), queue.clone());
        let worker = inner
            .spawn(move || {
                let _ = rt2.sleep(&q);
            })
            .unwrap();
        inner.yield_to(worker).unwrap();

        // Worker is blocked and nothing else can run while root waits
        let r = inner.join(worker);
        res.lock().push(format!("{r:?}"));
        res.lock().push(format!("worker: {:?}", inner.thread_state(worker)));

        inner.wake_one(&queue).unwrap();
        let r = inner.join(worker);
        res.lock().push(format!("{r:?}"));
    })
    .unwrap();

    assert_eq!(
        *results.lock(),
        vec![
            "Err(InvalidThread(Tid(1)))",
            "worker: Ok(Blocked)",
            "Ok((Tid(1), 0))",
        ]
    );
}
