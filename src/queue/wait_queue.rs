/*!
 * Wait Queue
 *
 * Shareable handle to a FIFO of threads blocked pending one event (lock
 * release, condition signal, target-thread exit).
 *
 * The handle's contents are only mutated inside the owning runtime's critical
 * section; the inner mutex exists so the handle can be shared across the OS
 * threads backing logical threads, and is never contended.
 */

use super::ThreadQueue;
use crate::core::errors::{ThreadError, ThreadResult};
use crate::core::types::Tid;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

struct State {
    waiters: ThreadQueue,
    destroyed: bool,
}

/// Handle to a queue of blocked threads
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct WaitQueue {
    owner: Uuid,
    state: Arc<Mutex<State>>,
}

impl WaitQueue {
    pub(crate) fn new(owner: Uuid) -> Self {
        Self {
            owner,
            state: Arc::new(Mutex::new(State {
                waiters: ThreadQueue::new(),
                destroyed: false,
            })),
        }
    }

    /// Number of threads currently blocked on this queue
    pub fn len(&self) -> usize {
        self.state.lock().waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().waiters.is_empty()
    }

    /// Blocked threads, longest-waiting first
    pub fn waiters(&self) -> Vec<Tid> {
        self.state.lock().waiters.iter().collect()
    }

    /// Whether the queue has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Whether both handles refer to the same queue
    pub fn same_queue(&self, other: &WaitQueue) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Verify the handle is live and belongs to the runtime `owner`
    pub(crate) fn check(&self, owner: Uuid) -> ThreadResult<()> {
        if self.owner != owner || self.state.lock().destroyed {
            return Err(ThreadError::InvalidQueue);
        }
        Ok(())
    }

    pub(crate) fn push(&self, tid: Tid) {
        self.state.lock().waiters.enqueue(tid);
    }

    pub(crate) fn pop(&self) -> Option<Tid> {
        self.state.lock().waiters.dequeue()
    }

    /// Apply `f` to the waiters without removing them
    pub(crate) fn with_waiters<R>(&self, f: impl FnOnce(&ThreadQueue) -> R) -> R {
        f(&self.state.lock().waiters)
    }

    /// Mark the queue destroyed; refused while threads are still queued
    pub(crate) fn destroy(&self) -> ThreadResult<()> {
        let mut state = self.state.lock();
        if !state.waiters.is_empty() {
            return Err(ThreadError::Busy);
        }
        state.destroyed = true;
        Ok(())
    }
}

impl fmt::Debug for WaitQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WaitQueue")
            .field("owner", &self.owner)
            .field("waiters", &state.waiters)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}
