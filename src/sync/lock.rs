/*!
 * Mutual-Exclusion Lock
 *
 * Blocking, non-reentrant lock for logical threads. Contending threads sleep
 * on the lock's wait queue and re-check after every wakeup; release wakes all
 * of them and the first to run takes the lock.
 *
 * The holder is recorded with its install generation. A lock whose holder
 * exited without releasing it counts as free, even after the holder's id has
 * been reused by a new thread.
 */

use crate::core::errors::{ThreadError, ThreadResult};
use crate::core::types::Tid;
use crate::queue::WaitQueue;
use crate::scheduler::{Critical, Runtime};
use log::debug;
use parking_lot::Mutex;
use std::fmt;

/// Thread holding a lock, pinned to one install of its id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Holder {
    tid: Tid,
    generation: u64,
}

impl Holder {
    fn of(cs: &Critical<'_>) -> Self {
        Self {
            tid: cs.me(),
            generation: cs.generation(),
        }
    }
}

pub struct Lock {
    runtime: Runtime,
    holder: Mutex<Option<Holder>>,
    waiters: WaitQueue,
}

impl Lock {
    /// Create an unheld lock owned by `runtime`
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            holder: Mutex::new(None),
            waiters: runtime.wait_queue(),
        }
    }

    /// Block until the calling thread holds the lock
    ///
    /// Fails with `Deadlock` if the caller already holds it, and with
    /// `NoneReady` if it is held and no other thread can run to release it.
    pub fn acquire(&self) -> ThreadResult<()> {
        loop {
            let cs = self.runtime.enter()?;
            self.waiters.check(self.runtime.id())?;

            {
                let me = Holder::of(&cs);
                let mut holder = self.holder.lock();
                match *holder {
                    Some(current) if current == me => return Err(ThreadError::Deadlock),
                    Some(current) if cs.is_live(current.tid, current.generation) => {}
                    stale => {
                        if let Some(gone) = stale {
                            debug!("Thread {} takes lock left by exited thread {}", me.tid, gone.tid);
                        }
                        *holder = Some(me);
                        return Ok(());
                    }
                }
            }

            self.runtime.sleep_in(cs, &self.waiters)?;
        }
    }

    /// Release the lock and wake every waiter; no-op unless the caller holds it
    pub fn release(&self) -> ThreadResult<()> {
        let mut cs = self.runtime.enter()?;
        self.release_in(&mut cs);
        Ok(())
    }

    /// Acquire and return a guard that releases on drop
    pub fn hold(&self) -> ThreadResult<LockGuard<'_>> {
        self.acquire()?;
        Ok(LockGuard { lock: self })
    }

    /// Destroy the lock; fails with `Busy` while held or awaited
    pub fn destroy(&self) -> ThreadResult<()> {
        let cs = self.runtime.enter()?;
        self.waiters.check(self.runtime.id())?;
        let held = *self.holder.lock();
        if held.is_some_and(|holder| cs.is_live(holder.tid, holder.generation)) {
            return Err(ThreadError::Busy);
        }
        self.waiters.destroy()?;
        debug!("Lock destroyed");
        Ok(())
    }

    /// Current holder, if it is still running
    pub fn holder(&self) -> Option<Tid> {
        let held = *self.holder.lock();
        held.filter(|holder| self.runtime.is_live(holder.tid, holder.generation))
            .map(|holder| holder.tid)
    }

    pub fn is_destroyed(&self) -> bool {
        self.waiters.is_destroyed()
    }

    /// Whether the thread owning `cs` holds the lock
    pub(crate) fn held_in(&self, cs: &Critical<'_>) -> bool {
        *self.holder.lock() == Some(Holder::of(cs))
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Release from inside a critical section; returns whether the caller held it
    pub(crate) fn release_in(&self, cs: &mut Critical<'_>) -> bool {
        {
            let mut holder = self.holder.lock();
            if *holder != Some(Holder::of(cs)) {
                return false;
            }
            *holder = None;
        }
        self.runtime.wake_all_in(cs, &self.waiters);
        true
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("holder", &self.holder())
            .field("waiters", &self.waiters.waiters())
            .finish()
    }
}

/// Holds a `Lock` until dropped
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    lock: &'a Lock,
}

impl LockGuard<'_> {
    pub fn lock(&self) -> &Lock {
        self.lock
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // Only fails if the runtime is gone, which leaves nothing to release
        let _ = self.lock.release();
    }
}
