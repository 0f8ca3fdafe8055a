/*!
 * uthread
 * User-level cooperative threads multiplexed over one execution stream
 *
 * A `Runtime` owns a fixed-capacity thread table and a FIFO ready queue.
 * Threads switch only at explicit suspension points (yield, sleep, join,
 * lock acquire, condition wait, exit); every scheduler mutation runs with
 * interrupt delivery masked.
 */

pub mod core;
pub mod hal;
pub mod monitoring;
pub mod queue;
pub mod scheduler;
pub mod sync;

// Re-exports
pub use crate::core::errors::{ConfigError, ThreadError, ThreadResult};
pub use crate::core::limits::{KILLED_EXIT_CODE, NORMAL_EXIT_CODE, PANICKED_EXIT_CODE};
pub use crate::core::types::{ExitCode, Target, ThreadState, Tid};
pub use hal::{InterruptController, SoftInterrupts};
pub use monitoring::init_tracing;
pub use queue::WaitQueue;
pub use scheduler::{
    JoinPolicy, Phase, Runtime, RuntimeBuilder, RuntimeConfig, RuntimeSnapshot, SchedulerStats, ThreadInfo,
};
pub use sync::{Condvar, Lock, LockGuard};
