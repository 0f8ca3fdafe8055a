/*!
 * Thread Queues
 *
 * FIFO sequences of thread ids. One `ThreadQueue` backs the ready queue, one
 * backs the exit queue, and every wait queue (per thread, lock, and condition
 * variable) wraps another.
 *
 * # Complexity
 *
 * - `enqueue` / `dequeue`: O(1)
 * - `remove` (dequeue a specific id): O(n)
 */

mod wait_queue;

pub use wait_queue::WaitQueue;

use crate::core::types::Tid;
use std::collections::VecDeque;

/// FIFO queue of thread ids
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ThreadQueue {
    entries: VecDeque<Tid>,
}

impl ThreadQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Create an empty queue with room for `capacity` ids
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an id at the tail
    #[inline]
    pub fn enqueue(&mut self, tid: Tid) {
        self.entries.push_back(tid);
    }

    /// Remove and return the id at the head, or `None` when empty
    #[inline]
    pub fn dequeue(&mut self) -> Option<Tid> {
        self.entries.pop_front()
    }

    /// Remove the first occurrence of `tid`, returning it, or `None` if absent
    pub fn remove(&mut self, tid: Tid) -> Option<Tid> {
        let pos = self.entries.iter().position(|&queued| queued == tid)?;
        self.entries.remove(pos)
    }

    /// Id at the head without removing it
    #[inline]
    pub fn peek(&self) -> Option<Tid> {
        self.entries.front().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.entries.contains(&tid)
    }

    /// Ids from head to tail
    pub fn iter(&self) -> impl Iterator<Item = Tid> + '_ {
        self.entries.iter().copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove every id, head first
    pub fn drain(&mut self) -> impl Iterator<Item = Tid> + '_ {
        self.entries.drain(..)
    }
}

impl FromIterator<Tid> for ThreadQueue {
    fn from_iter<I: IntoIterator<Item = Tid>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
