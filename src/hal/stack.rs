/*!
 * Stack Allocation
 *
 * Each logical thread owns one fixed-size stack region from creation until
 * the scheduler reclaims it after exit. A thread never frees the stack it is
 * executing on.
 *
 * Regions are mapped memory with a guard page below them. Released regions
 * are pooled and handed out again to later requests of the same size.
 */

use crate::core::limits::{MAX_STACK_SIZE, POOLED_STACKS};
use corosensei::stack::DefaultStack;
use log::warn;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An exclusively-owned stack region
///
/// Not `Clone`: exactly one thread owns a region at a time.
pub struct Stack {
    region: DefaultStack,
    size: usize,
}

impl Stack {
    /// Map a fresh region of at least `size` usable bytes
    pub fn allocate(size: usize) -> io::Result<Self> {
        if size == 0 || size > MAX_STACK_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("stack size {size} outside 1..={MAX_STACK_SIZE}"),
            ));
        }
        Ok(Self {
            region: DefaultStack::new(size)?,
            size,
        })
    }

    /// Requested size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn into_region(self) -> DefaultStack {
        self.region
    }

    pub(crate) fn from_region(region: DefaultStack, size: usize) -> Self {
        Self { region, size }
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack").field("size", &self.size).finish()
    }
}

/// Stack memory provider
pub trait StackAllocator: Send + Sync {
    /// Allocate a region of `size` bytes, or `None` if memory is exhausted
    fn allocate(&self, size: usize) -> Option<Stack>;

    /// Return a region allocated by this allocator
    fn release(&self, stack: Stack);

    /// Bytes currently handed out
    fn in_use(&self) -> usize;
}

/// Pooling stack allocator with an optional total byte budget
///
/// The budget bounds bytes handed out; pooled regions do not count against it.
pub struct BudgetedStacks {
    budget: Option<usize>,
    in_use: AtomicUsize,
    pool: Mutex<Vec<Stack>>,
}

impl BudgetedStacks {
    /// Allocator that refuses allocations beyond `budget` bytes in total
    pub fn new(budget: Option<usize>) -> Self {
        Self {
            budget,
            in_use: AtomicUsize::new(0),
            pool: Mutex::new(Vec::new()),
        }
    }

    /// Allocator without a budget
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn budget(&self) -> Option<usize> {
        self.budget
    }

    /// Released regions currently kept for reuse
    pub fn pooled(&self) -> usize {
        self.pool.lock().len()
    }

    /// Reserve `size` bytes of budget
    fn reserve(&self, size: usize) -> bool {
        let mut current = self.in_use.load(Ordering::Relaxed);
        loop {
            let Some(next) = current.checked_add(size) else {
                return false;
            };
            if matches!(self.budget, Some(budget) if next > budget) {
                return false;
            }
            match self.in_use.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for BudgetedStacks {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for BudgetedStacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BudgetedStacks")
            .field("budget", &self.budget)
            .field("in_use", &self.in_use())
            .field("pooled", &self.pooled())
            .finish()
    }
}

impl StackAllocator for BudgetedStacks {
    fn allocate(&self, size: usize) -> Option<Stack> {
        if size > MAX_STACK_SIZE || !self.reserve(size) {
            return None;
        }

        let pooled = {
            let mut pool = self.pool.lock();
            pool.iter()
                .position(|stack| stack.size() == size)
                .map(|index| pool.swap_remove(index))
        };
        if let Some(stack) = pooled {
            return Some(stack);
        }

        match Stack::allocate(size) {
            Ok(stack) => Some(stack),
            Err(err) => {
                warn!("Failed to map a {} byte stack: {}", size, err);
                self.in_use.fetch_sub(size, Ordering::AcqRel);
                None
            }
        }
    }

    fn release(&self, stack: Stack) {
        self.in_use.fetch_sub(stack.size(), Ordering::AcqRel);
        let mut pool = self.pool.lock();
        if pool.len() < POOLED_STACKS {
            pool.push(stack);
        }
    }

    fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }
}
