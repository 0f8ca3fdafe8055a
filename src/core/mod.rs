/*!
 * Core Module
 * Identity types, error taxonomy, and runtime-wide limits
 */

pub mod errors;
pub mod limits;
pub mod types;

pub use errors::{ConfigError, ThreadError, ThreadResult};
pub use limits::*;
pub use types::{ExitCode, Target, ThreadState, Tid};
