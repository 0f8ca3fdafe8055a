/*!
 * Execution Contexts
 *
 * Opaque prime/resume/suspend abstraction the scheduler core switches
 * through. The scheduler never sees registers or stack pointers: it primes a
 * context with a trampoline on a stack, resumes contexts to hand them the
 * processor, and suspends the running context to give the processor back.
 *
 * # Dispatching
 *
 * Every context of a runtime lives on the OS thread that called
 * `Runtime::run`, which acts as the dispatcher. A switch from A to B is A
 * suspending back to the dispatcher, which then resumes B. Contexts are never
 * moved to or resumed from another OS thread.
 *
 * # Default backend
 *
 * `CoroutineBackend` runs each context as a stackful `corosensei` coroutine
 * on a region from the stack allocator. Code following `suspend` is the
 * resumption path.
 */

use super::stack::Stack;
use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};
use std::cell::Cell;
use std::ptr;

/// How a suspended context was resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Continue normal execution
    Resume,
    /// The runtime is tearing down; unwind without running further work
    Shutdown,
}

/// What a context did with the processor when it gave it back
pub enum Slice {
    /// Suspended at a resumption point; resume it again later
    Suspended(Box<dyn ExecutionContext>),
    /// Its trampoline returned; the stack is free to reclaim
    Finished(Stack),
}

/// Execution stream of one logical thread
///
/// Owned by the dispatcher; not `Send`.
pub trait ExecutionContext {
    /// Run until the stream suspends or finishes
    fn resume(self: Box<Self>, wake: Wake) -> Slice;
}

/// Entry point a primed context runs when first resumed
pub type Trampoline = Box<dyn FnOnce(Wake) + Send + 'static>;

/// Builds contexts and suspends the running one
pub trait ContextBackend: Send + Sync {
    /// Prime a context that runs `trampoline` on `stack` once first resumed
    fn prime(&self, stack: Stack, trampoline: Trampoline) -> Box<dyn ExecutionContext>;

    /// Give the processor back to the dispatcher, returning how the running
    /// context was resumed
    ///
    /// Must be called only from inside a context primed by this backend.
    fn suspend(&self) -> Wake;
}

type Stream = Coroutine<Wake, (), (), DefaultStack>;

thread_local! {
    /// Yielder of the coroutine executing on this OS thread, null outside one
    static ACTIVE: Cell<*const Yielder<Wake, ()>> = const { Cell::new(ptr::null()) };
}

/// Context backend running each logical thread as a stackful coroutine
#[derive(Debug, Default, Clone, Copy)]
pub struct CoroutineBackend;

impl ContextBackend for CoroutineBackend {
    fn prime(&self, stack: Stack, trampoline: Trampoline) -> Box<dyn ExecutionContext> {
        let size = stack.size();
        let stream = Coroutine::with_stack(
            stack.into_region(),
            move |yielder: &Yielder<Wake, ()>, wake: Wake| {
                ACTIVE.with(|active| active.set(yielder));
                trampoline(wake);
            },
        );
        Box::new(CoroutineContext { stream, size })
    }

    fn suspend(&self) -> Wake {
        let yielder = ACTIVE.with(Cell::get);
        assert!(!yielder.is_null(), "suspend called outside an execution context");

        // SAFETY: ACTIVE only holds the yielder of the coroutine currently
        // executing on this OS thread, and a coroutine's yielder lives until
        // its body returns.
        let yielder = unsafe { &*yielder };
        let wake = yielder.suspend(());

        // A nested dispatcher may have run other coroutines in between
        ACTIVE.with(|active| active.set(yielder));
        wake
    }
}

struct CoroutineContext {
    stream: Stream,
    size: usize,
}

impl ExecutionContext for CoroutineContext {
    fn resume(mut self: Box<Self>, wake: Wake) -> Slice {
        let outer = ACTIVE.with(Cell::get);
        let result = self.stream.resume(wake);
        ACTIVE.with(|active| active.set(outer));

        match result {
            CoroutineResult::Yield(()) => Slice::Suspended(self),
            CoroutineResult::Return(()) => {
                let CoroutineContext { stream, size } = *self;
                Slice::Finished(Stack::from_region(stream.into_stack(), size))
            }
        }
    }
}
