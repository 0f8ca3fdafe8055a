/*!
 * Condition Variable
 *
 * Wait queue paired with a `Lock` at every call. All operations are silent
 * no-ops unless the caller holds the lock.
 */

use super::lock::Lock;
use crate::core::errors::ThreadResult;
use crate::queue::WaitQueue;
use crate::scheduler::Runtime;
use std::fmt;

pub struct Condvar {
    runtime: Runtime,
    waiters: WaitQueue,
}

impl Condvar {
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            waiters: runtime.wait_queue(),
        }
    }

    /// Release `lock`, block until signalled, then re-acquire `lock`
    ///
    /// Always returns with `lock` held when the caller held it on entry, even
    /// when blocking failed.
    pub fn wait(&self, lock: &Lock) -> ThreadResult<()> {
        let mut cs = self.runtime.enter()?;
        self.waiters.check(self.runtime.id())?;
        if lock.runtime().id() != self.runtime.id() || !lock.release_in(&mut cs) {
            return Ok(());
        }

        let slept = self.runtime.sleep_in(cs, &self.waiters);
        lock.acquire()?;
        slept.map(|_| ())
    }

    /// Wake the longest waiter; returns whether one was woken
    pub fn signal(&self, lock: &Lock) -> ThreadResult<bool> {
        let mut cs = self.runtime.enter()?;
        self.waiters.check(self.runtime.id())?;
        if !lock.held_in(&cs) {
            return Ok(false);
        }
        Ok(self.runtime.wake_in(&mut cs, &self.waiters))
    }

    /// Wake every waiter; returns how many were woken
    pub fn broadcast(&self, lock: &Lock) -> ThreadResult<usize> {
        let mut cs = self.runtime.enter()?;
        self.waiters.check(self.runtime.id())?;
        if !lock.held_in(&cs) {
            return Ok(0);
        }
        Ok(self.runtime.wake_all_in(&mut cs, &self.waiters))
    }

    /// Destroy the condition variable; fails with `Busy` while threads wait
    pub fn destroy(&self) -> ThreadResult<()> {
        self.runtime.destroy_wait_queue(&self.waiters)
    }

    /// Number of threads blocked in `wait`
    pub fn waiters(&self) -> usize {
        self.waiters.len()
    }
}

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condvar")
            .field("waiters", &self.waiters.waiters())
            .finish()
    }
}
