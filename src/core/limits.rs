/*!
 * Runtime Limits and Constants
 *
 * Centralized location for thread-table, stack, and exit-code constants.
 * Organized by domain for maintainability and discoverability.
 */

// =============================================================================
// THREAD TABLE LIMITS
// =============================================================================

/// Default number of thread slots in a runtime's table
/// The root thread occupies one slot, so a table of N holds N - 1 spawned threads
pub const DEFAULT_MAX_THREADS: usize = 1024;

/// Smallest table a runtime accepts (the root thread alone)
pub const MIN_THREADS: usize = 1;

// =============================================================================
// STACK LIMITS
// =============================================================================

/// Default stack size per logical thread (256KB)
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Minimum stack size per logical thread (64KB)
/// Below this the panic and logging machinery can overflow the stack
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Largest stack a single logical thread may request (64MB)
pub const MAX_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Released stacks an allocator keeps mapped for reuse
pub const POOLED_STACKS: usize = 16;

// =============================================================================
// EXIT CODES
// =============================================================================

/// Exit code of a thread whose entry function returned normally
pub const NORMAL_EXIT_CODE: i32 = 0;

/// Exit code reported for a thread terminated by a deferred kill
/// Negative codes are reserved for runtime-generated terminations
pub const KILLED_EXIT_CODE: i32 = -9;

/// Exit code reported for a thread whose entry function panicked
pub const PANICKED_EXIT_CODE: i32 = -101;
