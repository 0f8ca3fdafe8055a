/*!
 * Blocking and Waking
 *
 * Sleep/wakeup on wait queues and join-on-exit, built on the scheduler's
 * switch primitive. Locks and condition variables layer on top of these.
 */

use super::config::JoinPolicy;
use super::{Critical, Phase, Runtime, SchedState};
use crate::core::errors::{ThreadError, ThreadResult};
use crate::core::types::{ExitCode, ThreadState, Tid};
use crate::queue::WaitQueue;
use log::{debug, trace};

impl Runtime {
    /// Block the calling thread on `queue` until woken
    ///
    /// Returns the id of the thread the processor was handed to. Fails with
    /// `NoneReady` when no other thread could run.
    pub fn sleep(&self, queue: &WaitQueue) -> ThreadResult<Tid> {
        let cs = self.enter()?;
        self.sleep_in(cs, queue)
    }

    /// Sleep from inside an existing critical section
    pub(crate) fn sleep_in(&self, mut cs: Critical<'_>, queue: &WaitQueue) -> ThreadResult<Tid> {
        queue.check(self.0.id)?;
        if cs.state.phase != Phase::Running {
            return Err(ThreadError::NoneReady);
        }
        let next = cs.state.ready.dequeue().ok_or(ThreadError::NoneReady)?;
        let me = cs.me;

        cs.state.table.slot_mut(me).state = ThreadState::Blocked;
        queue.push(me);
        cs.state.runnable = cs.state.runnable.saturating_sub(1);
        trace!("Thread {} blocked", me);

        self.switch_to(cs, next);
        Ok(next)
    }

    /// Move the longest-waiting live thread on `queue` to the ready queue
    ///
    /// Returns whether a thread was woken.
    pub fn wake_one(&self, queue: &WaitQueue) -> ThreadResult<bool> {
        let mut cs = self.enter()?;
        queue.check(self.0.id)?;
        Ok(self.wake_in(&mut cs, queue))
    }

    /// Move every thread on `queue` to the ready queue
    ///
    /// Returns the number of live threads woken.
    pub fn wake_all(&self, queue: &WaitQueue) -> ThreadResult<usize> {
        let mut cs = self.enter()?;
        queue.check(self.0.id)?;
        Ok(self.wake_all_in(&mut cs, queue))
    }

    pub(crate) fn wake_in(&self, cs: &mut Critical<'_>, queue: &WaitQueue) -> bool {
        self.wake_one_in_state(&mut cs.state, queue)
    }

    pub(crate) fn wake_all_in(&self, cs: &mut Critical<'_>, queue: &WaitQueue) -> usize {
        self.wake_all_in_state(&mut cs.state, queue)
    }

    /// Kill-flagged waiters met on the way are made READY without counting
    /// as woken, so they reach their resumption point and terminate.
    pub(super) fn wake_one_in_state(&self, state: &mut SchedState, queue: &WaitQueue) -> bool {
        while let Some(tid) = queue.pop() {
            let slot = state.table.slot_mut(tid);
            if slot.state != ThreadState::Blocked {
                continue;
            }
            slot.state = ThreadState::Ready;
            let killed = slot.killed;
            state.ready.enqueue(tid);
            state.runnable += 1;

            if !killed {
                self.0.stats.inc_wakeups();
                trace!("Thread {} woken", tid);
                return true;
            }
        }
        false
    }

    pub(super) fn wake_all_in_state(&self, state: &mut SchedState, queue: &WaitQueue) -> usize {
        let mut woken = 0;
        while self.wake_one_in_state(state, queue) {
            woken += 1;
        }
        woken
    }

    /// Hand `code` to the joiners entitled to it under the join policy
    pub(super) fn deliver_exit_code(&self, state: &mut SchedState, joiners: &WaitQueue, code: ExitCode) {
        let policy = self.0.config.join_policy;
        joiners.with_waiters(|waiters| {
            for tid in waiters.iter() {
                let slot = state.table.slot_mut(tid);
                if slot.killed {
                    continue;
                }
                slot.delivered = Some(code);
                if policy == JoinPolicy::FirstWaiter {
                    break;
                }
            }
        });
    }

    /// Block until `tid` exits, returning its id and exit code
    ///
    /// Fails with `InvalidThread` if `tid` is the caller, not a live thread,
    /// already marked for kill, or exited without delivering its code to this
    /// waiter. Also fails with `InvalidThread` when the caller cannot block
    /// because no other thread is ready.
    pub fn join(&self, tid: Tid) -> ThreadResult<(Tid, ExitCode)> {
        let cs = self.enter()?;
        let me = cs.me;
        let joiners = match cs.state.table.get(tid) {
            Some(slot) if tid != me && slot.state.is_valid() && !slot.killed => slot.joiners.clone(),
            _ => return Err(ThreadError::InvalidThread(tid)),
        };

        debug!("Thread {} joining {}", me, tid);
        if let Err(err) = self.sleep_in(cs, &joiners) {
            debug!("Thread {} cannot wait for {}: {}", me, tid, err);
            return Err(ThreadError::InvalidThread(tid));
        }

        let mut cs = self.enter()?;
        cs.state
            .table
            .slot_mut(me)
            .delivered
            .take()
            .map(|code| (tid, code))
            .ok_or(ThreadError::InvalidThread(tid))
    }
}
