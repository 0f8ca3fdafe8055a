/*!
 * uthread - Demo Entry Point
 *
 * Runs three scenarios on one runtime:
 * - Root spawns A, B, C and yields to whichever is ready
 * - Two threads rendezvous through a lock and condition variable
 * - A thread killed while waiting on a lock is never granted it
 *
 * The process exits with the runtime's terminal exit code.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uthread::{init_tracing, Condvar, Lock, Runtime, RuntimeConfig, Target, ThreadResult};

fn main() -> miette::Result<()> {
    init_tracing();

    let config = RuntimeConfig::from_env()?;
    let runtime = Runtime::builder().with_config(config).build()?;

    let rt = runtime.clone();
    let code = runtime.run(move || {
        if let Err(e) = scenarios(&rt) {
            warn!(error = %e, "Scenario failed");
            let _ = rt.exit(1);
        }
    })?;

    info!(exit_code = code, stats = ?runtime.stats(), "Runtime finished");
    std::process::exit(code);
}

fn scenarios(rt: &Runtime) -> ThreadResult<()> {
    yield_to_workers(rt)?;
    rendezvous(rt)?;
    kill_lock_waiter(rt)?;
    Ok(())
}

fn yield_to_workers(rt: &Runtime) -> ThreadResult<()> {
    info!("--- yield to workers ---");
    for name in ["A", "B", "C"] {
        let tid = rt.spawn(move || println!("thread {name} running"))?;
        info!(thread = name, tid = tid.0, "Spawned");
    }

    for round in 1..=3 {
        match rt.yield_to(Target::Any) {
            Ok(tid) => println!("root: yield {round} ran thread {tid}"),
            Err(e) => println!("root: yield {round}: {e}"),
        }
    }
    Ok(())
}

fn rendezvous(rt: &Runtime) -> ThreadResult<()> {
    info!("--- rendezvous ---");
    let lock = Arc::new(Lock::new(rt));
    let cv = Arc::new(Condvar::new(rt));
    let arrived = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::new();
    for name in ["left", "right"] {
        let (rt2, lock, cv, arrived) = (rt.clone(), lock.clone(), cv.clone(), arrived.clone());
        workers.push(rt.spawn(move || {
            println!("{name}: before rendezvous");
            let result = (|| -> ThreadResult<()> {
                let _held = lock.hold()?;
                if arrived.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                    cv.broadcast(&lock)?;
                }
                while arrived.load(Ordering::SeqCst) < 2 {
                    cv.wait(&lock)?;
                }
                Ok(())
            })();
            if let Err(e) = result {
                warn!(thread = name, error = %e, "Rendezvous failed");
                let _ = rt2.exit(2);
            }
            println!("{name}: after rendezvous");
        })?);
    }

    // A worker that exits before root joins it is no longer joinable
    for tid in workers {
        match rt.join(tid) {
            Ok((_, code)) => info!(tid = tid.0, code, "Worker joined"),
            Err(e) => info!(tid = tid.0, reason = %e, "Worker already gone"),
        }
    }
    Ok(())
}

fn kill_lock_waiter(rt: &Runtime) -> ThreadResult<()> {
    info!("--- kill lock waiter ---");
    let lock = Arc::new(Lock::new(rt));
    lock.acquire()?;

    let mut waiters = Vec::new();
    for name in ["doomed", "survivor"] {
        let lock = lock.clone();
        waiters.push(rt.spawn(move || {
            if lock.acquire().is_ok() {
                println!("{name}: acquired lock");
                let _ = lock.release();
            }
        })?);
    }

    // Let both waiters block on the lock
    rt.yield_to(Target::Any)?;

    rt.kill(waiters[0])?;
    lock.release()?;

    let (_, code) = rt.join(waiters[1])?;
    info!(code, "Survivor finished");
    Ok(())
}
