/*!
 * Scheduler
 *
 * Cooperative scheduler multiplexing one processor across many logical
 * threads. A `Runtime` owns the thread table, the ready and exit queues, and
 * the identity of the running thread; everything that mutates them runs with
 * interrupts masked and the scheduler state locked.
 *
 * # Lifecycle
 *
 * `Runtime::run` starts the root thread (tid 0) and turns the calling OS
 * thread into the dispatcher: every logical thread runs on it, one at a time,
 * until some thread exits with nothing left ready. The dispatcher then shuts
 * down every remaining thread, reclaims all stacks, and returns that thread's
 * exit code.
 *
 * No OS-level lock may be held across a suspension point (yield, sleep, join,
 * lock acquire, condvar wait). The next logical thread runs on the same OS
 * thread and would block on it forever.
 *
 * # Lock ordering
 *
 * Interrupt mask, then scheduler state, then any wait queue or lock state.
 */

mod builder;
mod config;
mod dispatch;
mod operations;
mod stats;
mod table;
mod wait;

pub use builder::RuntimeBuilder;
pub use config::{JoinPolicy, RuntimeConfig};
pub use stats::{AtomicSchedulerStats, SchedulerStats};

use crate::core::errors::{ThreadError, ThreadResult};
use crate::core::types::{ExitCode, ThreadState, Tid};
use crate::hal::{ContextBackend, InterruptController, InterruptGuard, StackAllocator};
use crate::monitoring::RunSpan;
use crate::queue::{ThreadQueue, WaitQueue};
use dispatch::Dispatcher;
use log::info;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use table::ThreadTable;
use uuid::Uuid;

thread_local! {
    /// Runtime and thread id of the logical thread running on this OS thread
    static BOUND: Cell<Option<(Uuid, Tid)>> = const { Cell::new(None) };
}

/// Runtime lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Built, not yet started
    Idle,
    Running,
    /// Terminal exit reached; remaining threads are being shut down
    Draining,
    Terminated,
}

pub(crate) struct SchedState {
    table: ThreadTable,
    current: Tid,
    ready: ThreadQueue,
    exited: ThreadQueue,
    /// READY plus RUNNING threads
    runnable: usize,
    phase: Phase,
    /// Exit code of the terminal exit, once reached
    outcome: Option<ExitCode>,
}

/// Critical section held by the running thread
///
/// Fields drop in declaration order: the state lock is released before the
/// saved interrupt setting is restored.
pub(crate) struct Critical<'a> {
    state: MutexGuard<'a, SchedState>,
    me: Tid,
    irq: InterruptGuard<'a>,
}

impl Critical<'_> {
    /// The calling thread
    #[inline]
    pub(crate) fn me(&self) -> Tid {
        self.me
    }

    /// Install generation of the calling thread
    pub(crate) fn generation(&self) -> u64 {
        self.state.table.slot(self.me).generation
    }

    /// Whether `tid` is still the valid thread installed as `generation`
    pub(crate) fn is_live(&self, tid: Tid, generation: u64) -> bool {
        self.state.table.is_live(tid, generation)
    }
}

struct Inner {
    id: Uuid,
    config: RuntimeConfig,
    interrupts: Arc<dyn InterruptController>,
    stacks: Arc<dyn StackAllocator>,
    backend: Arc<dyn ContextBackend>,
    state: Mutex<SchedState>,
    stats: AtomicSchedulerStats,
}

/// Handle to a cooperative thread runtime
///
/// Cloning yields another handle to the same runtime.
#[derive(Clone)]
pub struct Runtime(Arc<Inner>);

/// Per-thread view in a `RuntimeSnapshot`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub tid: Tid,
    pub state: ThreadState,
    pub suspended: bool,
    pub killed: bool,
}

/// Serializable view of the scheduler state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub runtime: Uuid,
    pub phase: Phase,
    pub current: Tid,
    pub ready: Vec<Tid>,
    pub threads: Vec<ThreadInfo>,
    pub runnable: usize,
    pub stats: SchedulerStats,
}

impl Runtime {
    /// Runtime with the default configuration and collaborators
    pub fn new() -> Self {
        Self::assemble(
            RuntimeConfig::default(),
            Arc::new(crate::hal::SoftInterrupts::default()),
            Arc::new(crate::hal::BudgetedStacks::unbounded()),
            Arc::new(crate::hal::CoroutineBackend),
        )
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    fn assemble(
        config: RuntimeConfig,
        interrupts: Arc<dyn InterruptController>,
        stacks: Arc<dyn StackAllocator>,
        backend: Arc<dyn ContextBackend>,
    ) -> Self {
        let id = Uuid::new_v4();
        let state = SchedState {
            table: ThreadTable::new(config.max_threads, id),
            current: Tid::ROOT,
            ready: ThreadQueue::with_capacity(config.max_threads),
            exited: ThreadQueue::new(),
            runnable: 0,
            phase: Phase::Idle,
            outcome: None,
        };

        Self(Arc::new(Inner {
            id,
            config,
            interrupts,
            stacks,
            backend,
            state: Mutex::new(state),
            stats: AtomicSchedulerStats::new(),
        }))
    }

    /// Unique id of this runtime
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.0.config
    }

    pub fn stats(&self) -> SchedulerStats {
        self.0.stats.snapshot()
    }

    /// Run `root` as thread 0 until the runtime terminates
    ///
    /// Every logical thread runs on the calling OS thread, which does not
    /// return until the runtime terminates. Returns the exit code of the last
    /// thread to exit; the root returning normally counts as exiting with 0.
    pub fn run<F>(&self, root: F) -> ThreadResult<ExitCode>
    where
        F: FnOnce() + Send + 'static,
    {
        let span = RunSpan::new(self.0.id);
        let _entered = span.enter();
        let initial = self.0.interrupts.are_enabled();

        {
            let irq = self.mask();
            let mut state = self.0.state.lock();
            if state.phase != Phase::Idle {
                return Err(ThreadError::AlreadyStarted);
            }

            let tid = self.create_locked(&mut state, Box::new(root))?;
            state.ready.remove(tid);
            state.current = tid;
            state.phase = Phase::Running;
            info!("Runtime {} started with root thread {}", self.0.id, tid);

            drop(state);
            // The root enables delivery itself once it starts
            irq.hand_off();
        }

        let mut dispatcher = Dispatcher::new(self);
        let code = dispatcher.drive();
        dispatcher.shutdown(initial);

        span.record_exit(code);
        info!("Runtime {} terminated with exit code {}", self.0.id, code);
        Ok(code)
    }

    #[inline]
    fn mask(&self) -> InterruptGuard<'_> {
        InterruptGuard::new(&*self.0.interrupts)
    }

    /// Mask interrupts and lock the scheduler on behalf of the running thread
    ///
    /// Fails with `NotInRuntime` unless called from this runtime's current
    /// thread.
    pub(crate) fn enter(&self) -> ThreadResult<Critical<'_>> {
        // Callers outside this runtime's threads never touch the mask
        let bound = match BOUND.with(Cell::get) {
            Some((runtime, tid)) if runtime == self.0.id => tid,
            _ => return Err(ThreadError::NotInRuntime),
        };

        let irq = self.mask();
        let state = self.0.state.lock();
        let live = matches!(state.phase, Phase::Running | Phase::Draining);
        if !live || state.current != bound {
            return Err(ThreadError::NotInRuntime);
        }

        Ok(Critical {
            state,
            me: bound,
            irq,
        })
    }

    /// Id of the calling thread
    pub fn current(&self) -> ThreadResult<Tid> {
        self.enter().map(|cs| cs.me)
    }

    /// Scheduling state of `tid`
    pub fn thread_state(&self, tid: Tid) -> ThreadResult<ThreadState> {
        let state = self.0.state.lock();
        state
            .table
            .get(tid)
            .map(|slot| slot.state)
            .ok_or(ThreadError::InvalidThread(tid))
    }

    /// Number of READY and RUNNING threads
    pub fn runnable(&self) -> usize {
        self.0.state.lock().runnable
    }

    pub fn phase(&self) -> Phase {
        self.0.state.lock().phase
    }

    pub(crate) fn is_live(&self, tid: Tid, generation: u64) -> bool {
        self.0.state.lock().table.is_live(tid, generation)
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        let state = self.0.state.lock();
        RuntimeSnapshot {
            runtime: self.0.id,
            phase: state.phase,
            current: state.current,
            ready: state.ready.iter().collect(),
            threads: state
                .table
                .live()
                .map(|(tid, slot)| ThreadInfo {
                    tid,
                    state: slot.state,
                    suspended: slot.suspended,
                    killed: slot.killed,
                })
                .collect(),
            runnable: state.runnable,
            stats: self.0.stats.snapshot(),
        }
    }

    /// Create a wait queue owned by this runtime
    pub fn wait_queue(&self) -> WaitQueue {
        WaitQueue::new(self.0.id)
    }

    /// Destroy a wait queue; fails with `Busy` while threads wait on it
    pub fn destroy_wait_queue(&self, queue: &WaitQueue) -> ThreadResult<()> {
        queue.check(self.0.id)?;
        queue.destroy()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.0.id)
            .field("config", &self.0.config)
            .finish_non_exhaustive()
    }
}
