/*!
 * Interrupt Masking
 *
 * The only source of true asynchrony is interrupt delivery, which may invoke
 * runtime entry points at any moment. Every region that mutates scheduler
 * state masks delivery and restores the previous mask on exit, nested-safely.
 */

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Interrupt delivery controller
pub trait InterruptController: Send + Sync {
    /// Set whether interrupts are delivered, returning the previous setting
    fn set_enabled(&self, enabled: bool) -> bool;

    /// Whether interrupts are currently delivered
    fn are_enabled(&self) -> bool;

    /// Unconditionally enable delivery
    fn enable(&self) {
        self.set_enabled(true);
    }
}

/// Software interrupt mask
///
/// Tracks the mask as an atomic flag and counts mask transitions so tests can
/// observe the masking discipline.
#[derive(Debug)]
pub struct SoftInterrupts {
    enabled: AtomicBool,
    masks: AtomicU64,
}

impl SoftInterrupts {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            masks: AtomicU64::new(0),
        }
    }

    /// Number of times delivery went from enabled to masked
    pub fn mask_count(&self) -> u64 {
        self.masks.load(Ordering::Relaxed)
    }
}

impl Default for SoftInterrupts {
    fn default() -> Self {
        Self::new(true)
    }
}

impl InterruptController for SoftInterrupts {
    #[inline]
    fn set_enabled(&self, enabled: bool) -> bool {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous && !enabled {
            self.masks.fetch_add(1, Ordering::Relaxed);
        }
        previous
    }

    #[inline]
    fn are_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// Masks interrupts for its lifetime and restores the saved setting on drop
#[must_use = "interrupts are unmasked as soon as the guard is dropped"]
pub struct InterruptGuard<'a> {
    controller: &'a dyn InterruptController,
    previous: bool,
}

impl<'a> InterruptGuard<'a> {
    pub fn new(controller: &'a dyn InterruptController) -> Self {
        let previous = controller.set_enabled(false);
        Self {
            controller,
            previous,
        }
    }

    /// The setting restored when this guard drops
    pub fn previous(&self) -> bool {
        self.previous
    }

    /// Leave interrupts masked without restoring
    ///
    /// Used when the processor passes to another thread that restores its own
    /// saved setting.
    pub fn hand_off(self) {
        std::mem::forget(self);
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.controller.set_enabled(self.previous);
    }
}

/// Run `f` with interrupts masked
pub fn without_interrupts<R>(controller: &dyn InterruptController, f: impl FnOnce() -> R) -> R {
    let _guard = InterruptGuard::new(controller);
    f()
}
