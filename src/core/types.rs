/*!
 * Core Types
 * Thread identity, scheduling state, and yield targets
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit code delivered to joiners and returned when the runtime terminates
pub type ExitCode = i32;

/// Thread identifier (index into the runtime's thread table)
///
/// Stable while the thread is valid; reused only after the thread has exited
/// and its stack has been reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tid(pub u32);

impl Tid {
    /// The thread that `Runtime::run` starts with
    pub const ROOT: Self = Self(0);

    /// Table index for this id
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Tid {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Scheduling state of a thread slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    /// Queued on the ready queue, waiting for the processor
    Ready,
    /// Holds the processor
    Running,
    /// Queued on a wait queue until woken
    Blocked,
    /// Unused slot, or a thread that has exited
    Invalid,
}

impl ThreadState {
    /// Convert to string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Blocked => "blocked",
            Self::Invalid => "invalid",
        }
    }

    /// Whether the slot holds a live thread
    #[inline]
    pub const fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a voluntary context switch hands the processor to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "tid")]
pub enum Target {
    /// The caller itself (no switch)
    Current,
    /// Whichever thread is at the head of the ready queue
    Any,
    /// A specific thread, which must be on the ready queue
    Thread(Tid),
}

impl From<Tid> for Target {
    fn from(tid: Tid) -> Self {
        Self::Thread(tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tid_display_and_index() {
        let tid = Tid(7);
        assert_eq!(tid.to_string(), "7");
        assert_eq!(tid.index(), 7);
        assert_eq!(Tid::ROOT, Tid(0));
    }

    #[test]
    fn test_state_validity() {
        assert!(ThreadState::Ready.is_valid());
        assert!(ThreadState::Running.is_valid());
        assert!(ThreadState::Blocked.is_valid());
        assert!(!ThreadState::Invalid.is_valid());
    }

    #[test]
    fn test_serde_shapes() {
        assert_eq!(serde_json::to_string(&Tid(3)).unwrap(), "3");
        assert_eq!(
            serde_json::to_string(&ThreadState::Blocked).unwrap(),
            "\"blocked\""
        );
        let target: Target = serde_json::from_str(r#"{"kind":"thread","tid":4}"#).unwrap();
        assert_eq!(target, Target::Thread(Tid(4)));
    }
}
