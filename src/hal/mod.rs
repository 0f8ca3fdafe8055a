/*!
 * Hardware Abstraction
 *
 * External collaborators of the scheduler core, each behind a trait with a
 * default implementation:
 * - Interrupt controller: mask/unmask delivery
 * - Execution contexts: prime, resume, suspend
 * - Stack allocator: fixed-size exclusively-owned regions, pooled for reuse
 */

pub mod context;
pub mod interrupts;
pub mod stack;

pub use context::{ContextBackend, CoroutineBackend, ExecutionContext, Slice, Trampoline, Wake};
pub use interrupts::{without_interrupts, InterruptController, InterruptGuard, SoftInterrupts};
pub use stack::{BudgetedStacks, Stack, StackAllocator};
