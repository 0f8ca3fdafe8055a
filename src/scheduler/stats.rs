/*!
 * Lock-Free Scheduler Statistics
 * Atomic counters bumped on the scheduling hot paths
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub threads_created: u64,
    pub threads_exited: u64,
    pub kill_requests: u64,
    pub context_switches: u64,
    pub wakeups: u64,
    pub stacks_reclaimed: u64,
}

/// Atomic scheduler statistics
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Relaxed ordering; counters are independent of each other
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct AtomicSchedulerStats {
    created: AtomicU64,
    exited: AtomicU64,
    kill_requests: AtomicU64,
    context_switches: AtomicU64,
    wakeups: AtomicU64,
    reclaimed: AtomicU64,
}

impl AtomicSchedulerStats {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn inc_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_exited(&self) {
        self.exited.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_kill_requests(&self) {
        self.kill_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment context switches
    ///
    /// # Performance
    /// Hot path - called on every handoff between threads
    #[inline(always)]
    pub fn inc_context_switches(&self) {
        self.context_switches.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a live waiter moved back onto the ready queue
    #[inline(always)]
    pub fn inc_wakeups(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_reclaimed(&self) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats
    ///
    /// # Note
    /// Individual counters are exact; they are not read atomically as a group.
    #[inline]
    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            threads_created: self.created.load(Ordering::Relaxed),
            threads_exited: self.exited.load(Ordering::Relaxed),
            kill_requests: self.kill_requests.load(Ordering::Relaxed),
            context_switches: self.context_switches.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            stacks_reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = AtomicSchedulerStats::new();
        stats.inc_created();
        stats.inc_created();
        stats.inc_context_switches();
        stats.inc_exited();

        let snap = stats.snapshot();
        assert_eq!(snap.threads_created, 2);
        assert_eq!(snap.context_switches, 1);
        assert_eq!(snap.threads_exited, 1);
        assert_eq!(snap.wakeups, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(AtomicSchedulerStats::new().snapshot()).unwrap();
        assert_eq!(json["stacks_reclaimed"], 0);
    }
}
