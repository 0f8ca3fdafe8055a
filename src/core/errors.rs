/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::Tid;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for thread operations
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Thread and synchronization errors with serialization support
///
/// Every failure is reported to the immediate caller; nothing is raised
/// asynchronously in another thread.
#[derive(Error, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ThreadError {
    #[error("Thread table is full ({capacity} slots)")]
    #[diagnostic(
        code(thread::no_more_threads),
        help("Wait for threads to exit, or raise max_threads in the runtime configuration.")
    )]
    NoMoreThreads { capacity: usize },

    #[error("Stack allocation of {requested} bytes failed")]
    #[diagnostic(
        code(thread::no_memory),
        help("The stack budget is exhausted or the platform refused the stack. Lower stack_size or raise stack_budget.")
    )]
    NoMemory { requested: usize },

    #[error("No other thread is ready to run")]
    #[diagnostic(
        code(thread::none_ready),
        help("Every other thread is blocked or exited; switching away would deadlock.")
    )]
    NoneReady,

    #[error("Thread {0} is not a valid target")]
    #[diagnostic(
        code(thread::invalid),
        help("The id is out of range, not currently valid, the caller itself, or not in the required state.")
    )]
    InvalidThread(Tid),

    #[error("Wait queue handle is not usable")]
    #[diagnostic(
        code(thread::invalid_queue),
        help("The queue was destroyed or belongs to a different runtime.")
    )]
    InvalidQueue,

    #[error("Resource still in use")]
    #[diagnostic(
        code(thread::busy),
        help("Destroy only succeeds once the lock is free and no thread is waiting.")
    )]
    Busy,

    #[error("Lock is already held by the calling thread")]
    #[diagnostic(
        code(thread::deadlock),
        help("Locks are not re-entrant. Release the lock before acquiring it again.")
    )]
    Deadlock,

    #[error("Calling thread does not belong to a running runtime")]
    #[diagnostic(
        code(thread::not_in_runtime),
        help("Thread operations must be invoked from a thread created by this runtime.")
    )]
    NotInRuntime,

    #[error("Runtime has already been started")]
    #[diagnostic(
        code(thread::already_started),
        help("A runtime runs exactly once. Build a new runtime for another run.")
    )]
    AlreadyStarted,
}

impl ThreadError {
    /// Whether the error reports exhausted capacity rather than misuse
    pub const fn is_capacity(&self) -> bool {
        matches!(self, Self::NoMoreThreads { .. } | Self::NoMemory { .. })
    }
}

/// Configuration errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    #[diagnostic(
        code(config::invalid_value),
        help("Check the value against the documented range for this setting.")
    )]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to parse configuration: {0}")]
    #[diagnostic(code(config::parse), help("The configuration must be a JSON object."))]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ThreadError::InvalidThread(Tid(5)).to_string(),
            "Thread 5 is not a valid target"
        );
        assert_eq!(
            ThreadError::NoMoreThreads { capacity: 4 }.to_string(),
            "Thread table is full (4 slots)"
        );
    }

    #[test]
    fn test_error_serialization() {
        let json = serde_json::to_string(&ThreadError::InvalidThread(Tid(2))).unwrap();
        assert_eq!(json, r#"{"error_type":"invalid_thread","details":2}"#);

        let back: ThreadError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ThreadError::InvalidThread(Tid(2)));
    }

    #[test]
    fn test_capacity_classification() {
        assert!(ThreadError::NoMemory { requested: 1 }.is_capacity());
        assert!(!ThreadError::NoneReady.is_capacity());
    }
}
