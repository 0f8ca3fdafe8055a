/*!
 * Configuration Tests
 * Environment, JSON, and builder validation
 */

use pretty_assertions::assert_eq;
use serial_test::serial;
use uthread::core::limits::{DEFAULT_MAX_THREADS, DEFAULT_STACK_SIZE, MIN_STACK_SIZE};
use uthread::{ConfigError, JoinPolicy, Runtime, RuntimeConfig};

const VARS: [&str; 4] = [
    RuntimeConfig::ENV_MAX_THREADS,
    RuntimeConfig::ENV_STACK_SIZE,
    RuntimeConfig::ENV_STACK_BUDGET,
    RuntimeConfig::ENV_JOIN_POLICY,
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = RuntimeConfig::from_env().unwrap();
    assert_eq!(config, RuntimeConfig::default());
    assert_eq!(config.max_threads, DEFAULT_MAX_THREADS);
    assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var(RuntimeConfig::ENV_MAX_THREADS, "32");
    std::env::set_var(RuntimeConfig::ENV_STACK_SIZE, "131072");
    std::env::set_var(RuntimeConfig::ENV_STACK_BUDGET, "1048576");
    std::env::set_var(RuntimeConfig::ENV_JOIN_POLICY, "all_waiters");

    let config = RuntimeConfig::from_env().unwrap();
    clear_env();

    assert_eq!(
        config,
        RuntimeConfig {
            max_threads: 32,
            stack_size: 131072,
            stack_budget: Some(1048576),
            join_policy: JoinPolicy::AllWaiters,
        }
    );
}

#[test]
#[serial]
fn test_from_env_rejects_garbage() {
    clear_env();
    std::env::set_var(RuntimeConfig::ENV_MAX_THREADS, "lots");
    let err = RuntimeConfig::from_env().unwrap_err();
    clear_env();

    assert!(matches!(
        err,
        ConfigError::InvalidValue { key: "max_threads", ref value } if value == "lots"
    ));
}

#[test]
#[serial]
fn test_from_env_validates() {
    clear_env();
    std::env::set_var(RuntimeConfig::ENV_STACK_SIZE, "4096");
    let result = RuntimeConfig::from_env();
    clear_env();

    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { key: "stack_size", .. })
    ));
}

#[test]
fn test_from_json_round_trip() {
    let config = RuntimeConfig {
        max_threads: 64,
        stack_size: MIN_STACK_SIZE,
        stack_budget: None,
        join_policy: JoinPolicy::FirstWaiter,
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(RuntimeConfig::from_json(&json).unwrap(), config);
}

#[test]
fn test_from_json_malformed() {
    assert!(matches!(
        RuntimeConfig::from_json("{not json"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_builder_validates() {
    assert!(Runtime::builder().with_max_threads(0).build().is_err());
    assert!(Runtime::builder().with_stack_size(1).build().is_err());

    let rt = Runtime::builder()
        .with_max_threads(2)
        .with_join_policy(JoinPolicy::AllWaiters)
        .build()
        .unwrap();
    assert_eq!(rt.config().max_threads, 2);
    assert_eq!(rt.config().join_policy, JoinPolicy::AllWaiters);
}
