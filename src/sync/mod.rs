/*!
 * Synchronization Primitives
 *
 * Blocking lock and condition variable for logical threads, built strictly on
 * the scheduler's sleep/wakeup primitives. Scheduler state itself is never
 * protected by these.
 */

mod condvar;
mod lock;

pub use condvar::Condvar;
pub use lock::{Lock, LockGuard};
