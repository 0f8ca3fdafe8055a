/*!
 * Scheduler Operations
 * Thread creation, voluntary switching, termination, and deferred kill
 */

use super::{Critical, Phase, Runtime, SchedState};
use crate::core::errors::{ThreadError, ThreadResult};
use crate::core::limits::{KILLED_EXIT_CODE, NORMAL_EXIT_CODE, PANICKED_EXIT_CODE};
use crate::core::types::{ExitCode, Target, ThreadState, Tid};
use crate::hal::{Trampoline, Wake};
use log::{debug, error, trace};
use std::any::Any;
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Code a logical thread runs
pub(crate) type Entry = Box<dyn FnOnce() + Send + 'static>;

/// Payload carried by the unwind that ends a logical thread early
enum Unwind {
    Exit(ExitCode),
    Shutdown,
}

impl Runtime {
    /// Create a thread running `entry` and queue it as READY
    ///
    /// The new thread terminates with exit code 0 if `entry` returns.
    pub fn spawn<F>(&self, entry: F) -> ThreadResult<Tid>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut cs = self.enter()?;
        if cs.state.phase != Phase::Running {
            return Err(ThreadError::NotInRuntime);
        }
        self.create_locked(&mut cs.state, Box::new(entry))
    }

    pub(super) fn create_locked(&self, state: &mut SchedState, entry: Entry) -> ThreadResult<Tid> {
        let tid = state.table.find_free().ok_or(ThreadError::NoMoreThreads {
            capacity: state.table.capacity(),
        })?;

        let size = self.0.config.stack_size;
        let stack = self
            .0
            .stacks
            .allocate(size)
            .ok_or(ThreadError::NoMemory { requested: size })?;

        // Primed by the dispatcher on first schedule
        state.table.install(tid, entry, stack);
        state.ready.enqueue(tid);
        state.runnable += 1;
        self.0.stats.inc_created();
        debug!("Created thread {}", tid);
        Ok(tid)
    }

    /// Entry point for a freshly primed context
    pub(super) fn trampoline(&self, tid: Tid, entry: Entry) -> Trampoline {
        let runtime = self.clone();
        Box::new(move |wake| runtime.thread_main(tid, entry, wake))
    }

    fn thread_main(&self, tid: Tid, entry: Entry, wake: Wake) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            // A thread killed before its first start never runs its entry
            if let Some(unwind) = self.resume_from(tid, wake) {
                panic::resume_unwind(Box::new(unwind));
            }
            self.0.interrupts.enable();
            entry();
        }));

        let code = match outcome {
            Ok(()) => Some(NORMAL_EXIT_CODE),
            Err(payload) => match payload.downcast::<Unwind>() {
                Ok(unwind) => match *unwind {
                    Unwind::Exit(code) => Some(code),
                    Unwind::Shutdown => None,
                },
                Err(payload) => {
                    error!("Thread {} panicked: {}", tid, panic_message(payload.as_ref()));
                    Some(PANICKED_EXIT_CODE)
                }
            },
        };

        if let Some(code) = code {
            self.finish(tid, code);
        }
    }

    /// Yield the processor to `target`
    ///
    /// Returns the id of the thread switched to once the caller runs again,
    /// or the caller's own id when the target is the caller.
    pub fn yield_to(&self, target: impl Into<Target>) -> ThreadResult<Tid> {
        let mut cs = self.enter()?;
        let me = cs.me;

        let next = match target.into() {
            Target::Current => return Ok(me),
            Target::Thread(tid) if tid == me => return Ok(me),
            _ if cs.state.phase != Phase::Running => return Err(ThreadError::NoneReady),
            Target::Any => cs.state.ready.dequeue().ok_or(ThreadError::NoneReady)?,
            Target::Thread(tid) => {
                if !cs.state.table.in_range(tid) {
                    return Err(ThreadError::InvalidThread(tid));
                }
                cs.state.ready.remove(tid).ok_or(ThreadError::InvalidThread(tid))?
            }
        };

        cs.state.table.slot_mut(me).state = ThreadState::Ready;
        cs.state.ready.enqueue(me);

        self.switch_to(cs, next);
        Ok(next)
    }

    /// Hand the processor from the caller to `next`, returning once the
    /// caller is resumed
    ///
    /// The caller has already queued itself wherever it should wait.
    /// Interrupts stay masked until this returns; if the caller resumes only
    /// to terminate, they stay masked through the unwind.
    pub(super) fn switch_to(&self, cs: Critical<'_>, next: Tid) {
        let Critical { mut state, me, irq } = cs;
        state.table.slot_mut(me).suspended = true;
        state.current = next;
        drop(state);

        self.0.stats.inc_context_switches();
        trace!("Switch {} -> {}", me, next);
        let wake = self.0.backend.suspend();

        match self.resume_from(me, wake) {
            Some(unwind) => {
                irq.hand_off();
                panic::resume_unwind(Box::new(unwind))
            }
            None => drop(irq),
        }
    }

    /// Resumption point of every suspended thread, including its first start
    ///
    /// Reclaims the stacks of exited threads. Returns the unwind that ends
    /// the caller when the runtime is shutting down or a kill was requested
    /// while it was suspended, unless it is already unwinding.
    fn resume_from(&self, me: Tid, wake: Wake) -> Option<Unwind> {
        // Unwinding again while already unwinding would abort the process
        let unwinding = thread::panicking();
        if wake == Wake::Shutdown {
            return (!unwinding).then_some(Unwind::Shutdown);
        }

        let killed = {
            let mut state = self.0.state.lock();
            let slot = state.table.slot_mut(me);
            slot.suspended = false;
            slot.state = ThreadState::Running;
            let killed = slot.killed;
            self.drain_exited(&mut state);
            killed
        };

        if killed && !unwinding {
            debug!("Thread {} observed pending kill", me);
            return Some(Unwind::Exit(KILLED_EXIT_CODE));
        }
        None
    }

    /// Release the stacks of every thread on the exit queue
    ///
    /// The dispatcher retires a finished thread's stack before resuming
    /// anything else, so every queued stack is back in its slot here.
    fn drain_exited(&self, state: &mut SchedState) {
        while let Some(tid) = state.exited.dequeue() {
            if let Some(stack) = state.table.slot_mut(tid).stack.take() {
                self.0.stacks.release(stack);
                self.0.stats.inc_reclaimed();
                trace!("Reclaimed stack of thread {}", tid);
            }
        }
    }

    /// Terminate the calling thread with `code`
    ///
    /// Unwinds the caller's frames with interrupts masked, delivers `code` to
    /// its joiners, and switches to the next ready thread; if none is ready
    /// the runtime terminates with `code`. Returns only on failure:
    /// `NotInRuntime` for a foreign caller, or `Busy` when the caller is
    /// already unwinding from a panic.
    pub fn exit(&self, code: ExitCode) -> ThreadResult<Infallible> {
        let cs = self.enter()?;
        if thread::panicking() {
            return Err(ThreadError::Busy);
        }

        let Critical { state, irq, .. } = cs;
        drop(state);
        irq.hand_off();
        panic::resume_unwind(Box::new(Unwind::Exit(code)))
    }

    /// Exit bookkeeping, run at the bottom of the terminating thread's stack
    ///
    /// Picks the next thread for the dispatcher, or records the terminal exit
    /// code when none is ready.
    fn finish(&self, me: Tid, code: ExitCode) {
        let irq = self.mask();
        let mut state = self.0.state.lock();
        if state.phase != Phase::Running {
            return;
        }

        let joiners = {
            let slot = state.table.slot_mut(me);
            slot.state = ThreadState::Invalid;
            slot.killed = false;
            slot.suspended = false;
            slot.delivered = None;
            slot.joiners.clone()
        };
        state.exited.enqueue(me);
        state.ready.remove(me);
        state.runnable = state.runnable.saturating_sub(1);
        self.0.stats.inc_exited();
        debug!("Thread {} exited with code {}", me, code);

        self.deliver_exit_code(&mut state, &joiners, code);
        self.wake_all_in_state(&mut state, &joiners);

        match state.ready.dequeue() {
            Some(next) => {
                state.current = next;
                self.0.stats.inc_context_switches();
                trace!("Switch {} -> {} (exit)", me, next);
            }
            None => state.outcome = Some(code),
        }

        drop(state);
        // The next thread restores its own saved mask
        irq.hand_off();
    }

    /// Request termination of a READY or BLOCKED thread
    ///
    /// The target terminates with `KILLED_EXIT_CODE` at its next resumption
    /// point instead of resuming.
    pub fn kill(&self, tid: Tid) -> ThreadResult<Tid> {
        let mut cs = self.enter()?;
        if tid == cs.me || !cs.state.table.in_range(tid) {
            return Err(ThreadError::InvalidThread(tid));
        }

        let slot = cs.state.table.slot_mut(tid);
        match slot.state {
            ThreadState::Ready | ThreadState::Blocked => slot.killed = true,
            ThreadState::Running | ThreadState::Invalid => {
                return Err(ThreadError::InvalidThread(tid))
            }
        }

        self.0.stats.inc_kill_requests();
        debug!("Thread {} marked for kill by {}", tid, cs.me);
        Ok(tid)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
