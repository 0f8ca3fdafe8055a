/*!
 * Runtime Configuration
 *
 * Table capacity, stack sizing, and join delivery policy. Loaded from
 * defaults, the environment, or JSON.
 */

use crate::core::errors::ConfigError;
use crate::core::limits::{
    DEFAULT_MAX_THREADS, DEFAULT_STACK_SIZE, MAX_STACK_SIZE, MIN_STACK_SIZE, MIN_THREADS,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which joiners receive a terminating thread's exit code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Only the longest-waiting live joiner; the rest wake with an error
    #[default]
    FirstWaiter,
    /// Every live joiner
    AllWaiters,
}

impl FromStr for JoinPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_waiter" | "first" => Ok(Self::FirstWaiter),
            "all_waiters" | "all" => Ok(Self::AllWaiters),
            _ => Err(ConfigError::InvalidValue {
                key: "join_policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Thread table capacity, including the root thread
    pub max_threads: usize,
    /// Stack size in bytes for every logical thread
    pub stack_size: usize,
    /// Total bytes of stack the runtime may hold at once; unbounded if `None`
    pub stack_budget: Option<usize>,
    pub join_policy: JoinPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            stack_size: DEFAULT_STACK_SIZE,
            stack_budget: None,
            join_policy: JoinPolicy::FirstWaiter,
        }
    }
}

impl RuntimeConfig {
    pub const ENV_MAX_THREADS: &'static str = "UTHREAD_MAX_THREADS";
    pub const ENV_STACK_SIZE: &'static str = "UTHREAD_STACK_SIZE";
    pub const ENV_STACK_BUDGET: &'static str = "UTHREAD_STACK_BUDGET";
    pub const ENV_JOIN_POLICY: &'static str = "UTHREAD_JOIN_POLICY";

    /// Defaults overridden by any `UTHREAD_*` environment variables present
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = env_value(Self::ENV_MAX_THREADS) {
            config.max_threads = parse_size("max_threads", &value)?;
        }
        if let Some(value) = env_value(Self::ENV_STACK_SIZE) {
            config.stack_size = parse_size("stack_size", &value)?;
        }
        if let Some(value) = env_value(Self::ENV_STACK_BUDGET) {
            config.stack_budget = Some(parse_size("stack_budget", &value)?);
        }
        if let Some(value) = env_value(Self::ENV_JOIN_POLICY) {
            config.join_policy = value.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON object; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads < MIN_THREADS || self.max_threads > u32::MAX as usize {
            return Err(ConfigError::InvalidValue {
                key: "max_threads",
                value: self.max_threads.to_string(),
            });
        }
        if !(MIN_STACK_SIZE..=MAX_STACK_SIZE).contains(&self.stack_size) {
            return Err(ConfigError::InvalidValue {
                key: "stack_size",
                value: self.stack_size.to_string(),
            });
        }
        // A budget too small for a single stack could never start the root thread
        if let Some(budget) = self.stack_budget {
            if budget < self.stack_size {
                return Err(ConfigError::InvalidValue {
                    key: "stack_budget",
                    value: budget.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_size(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}
