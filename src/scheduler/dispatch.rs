/*!
 * Dispatcher
 *
 * Loop run on the OS thread that called `Runtime::run`. It resumes whichever
 * logical thread is current until that thread gives the processor back,
 * primes threads lazily on their first start, and retires the stacks of
 * threads whose trampoline returned.
 */

use super::{Phase, Runtime, BOUND};
use crate::core::limits::PANICKED_EXIT_CODE;
use crate::core::types::{ExitCode, ThreadState, Tid};
use crate::hal::{ExecutionContext, Slice, Wake};
use crate::monitoring;
use log::{debug, error, info, trace, warn};
use tracing::Span;
use uuid::Uuid;

/// Context of a started thread, held while it is suspended
struct Resident {
    context: Box<dyn ExecutionContext>,
    span: Span,
}

pub(super) struct Dispatcher<'a> {
    runtime: &'a Runtime,
    resident: Vec<Option<Resident>>,
    /// Binding of the OS thread before the dispatcher took it over
    outer: Option<(Uuid, Tid)>,
}

impl<'a> Dispatcher<'a> {
    pub(super) fn new(runtime: &'a Runtime) -> Self {
        let capacity = runtime.0.config.max_threads;
        Self {
            runtime,
            resident: (0..capacity).map(|_| None).collect(),
            outer: BOUND.with(|bound| bound.get()),
        }
    }

    /// Resume the current thread until the runtime reaches its terminal exit
    pub(super) fn drive(&mut self) -> ExitCode {
        let runtime = self.runtime;
        let inner = &runtime.0;
        loop {
            let (tid, primed) = {
                let mut state = inner.state.lock();
                if let Some(code) = state.outcome {
                    return code;
                }
                let tid = state.current;
                let slot = state.table.slot_mut(tid);
                let primed = match (slot.entry.take(), slot.stack.take()) {
                    (Some(entry), Some(stack)) => {
                        slot.resident = true;
                        Some((entry, stack))
                    }
                    (entry, stack) => {
                        slot.entry = entry;
                        slot.stack = stack;
                        None
                    }
                };
                (tid, primed)
            };

            let resident = match primed {
                Some((entry, stack)) => {
                    trace!("Priming thread {}", tid);
                    Resident {
                        context: inner.backend.prime(stack, runtime.trampoline(tid, entry)),
                        span: monitoring::thread_span(inner.id, tid),
                    }
                }
                None => match self.resident[tid.index()].take() {
                    Some(resident) => resident,
                    None => {
                        error!("Thread {} scheduled without a context", tid);
                        return PANICKED_EXIT_CODE;
                    }
                },
            };

            let Resident { context, span } = resident;
            match self.resume(tid, context, &span, Wake::Resume) {
                Slice::Suspended(context) => {
                    self.resident[tid.index()] = Some(Resident { context, span });
                }
                Slice::Finished(stack) => {
                    let mut state = inner.state.lock();
                    let slot = state.table.slot_mut(tid);
                    slot.resident = false;
                    slot.stack = Some(stack);
                    trace!("Thread {} retired", tid);
                }
            }
        }
    }

    fn resume(&self, tid: Tid, context: Box<dyn ExecutionContext>, span: &Span, wake: Wake) -> Slice {
        BOUND.with(|bound| bound.set(Some((self.runtime.0.id, tid))));
        let slice = span.in_scope(|| context.resume(wake));
        BOUND.with(|bound| bound.set(self.outer));
        slice
    }

    /// Shut down every remaining thread and reclaim all stacks
    ///
    /// Started threads are unwound on their own stacks so their destructors
    /// run; threads that never started just drop their entry. Leaves the
    /// interrupt mask as `initial`.
    pub(super) fn shutdown(mut self, initial: bool) {
        let runtime = self.runtime;
        let inner = &runtime.0;
        let occupied = {
            let mut state = inner.state.lock();
            state.phase = Phase::Draining;
            state.table.occupied()
        };
        debug!("Shutting down {} remaining threads", occupied.len());

        for tid in occupied {
            let (entry, stack) = {
                let mut state = inner.state.lock();
                let slot = state.table.slot_mut(tid);
                slot.state = ThreadState::Invalid;
                slot.killed = false;
                slot.suspended = false;
                (slot.entry.take(), slot.stack.take())
            };
            // Captured values may run arbitrary destructors
            drop(entry);
            if let Some(stack) = stack {
                inner.stacks.release(stack);
                inner.stats.inc_reclaimed();
            }

            if let Some(resident) = self.resident[tid.index()].take() {
                self.unwind(tid, resident);
            }
        }

        {
            let mut state = inner.state.lock();
            state.ready.clear();
            state.exited.clear();
            state.runnable = 0;
            state.phase = Phase::Terminated;
        }

        let leaked = inner.stacks.in_use();
        if leaked != 0 {
            warn!("Runtime {} terminated with {} stack bytes still in use", inner.id, leaked);
        }
        inner.interrupts.set_enabled(initial);
        info!("Runtime {} shut down", inner.id);
    }

    /// Unwind a started thread until its trampoline returns
    fn unwind(&self, tid: Tid, resident: Resident) {
        let runtime = self.runtime;
        let inner = &runtime.0;
        inner.state.lock().current = tid;

        let Resident { mut context, span } = resident;
        loop {
            match self.resume(tid, context, &span, Wake::Shutdown) {
                Slice::Finished(stack) => {
                    inner.stacks.release(stack);
                    inner.stats.inc_reclaimed();
                    inner.state.lock().table.slot_mut(tid).resident = false;
                    trace!("Thread {} unwound", tid);
                    return;
                }
                Slice::Suspended(next) => {
                    warn!("Thread {} suspended during shutdown", tid);
                    context = next;
                }
            }
        }
    }
}

impl Drop for Dispatcher<'_> {
    fn drop(&mut self) {
        // Only left over when the dispatcher itself panicked; dropping a
        // suspended coroutine would unwind it into its runtime mid-panic
        for resident in self.resident.drain(..).flatten() {
            std::mem::forget(resident.context);
        }
        BOUND.with(|bound| bound.set(self.outer));
    }
}
