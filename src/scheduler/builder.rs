/*!
 * Runtime Builder
 * Builder pattern for Runtime construction
 */

use super::config::{JoinPolicy, RuntimeConfig};
use super::Runtime;
use crate::core::errors::ConfigError;
use crate::hal::{
    BudgetedStacks, ContextBackend, CoroutineBackend, InterruptController, SoftInterrupts, StackAllocator,
};
use log::info;
use std::sync::Arc;

/// Builder for Runtime
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    interrupts: Option<Arc<dyn InterruptController>>,
    stacks: Option<Arc<dyn StackAllocator>>,
    backend: Option<Arc<dyn ContextBackend>>,
}

impl RuntimeBuilder {
    /// Create a new Runtime builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.config.max_threads = max_threads;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.config.stack_size = stack_size;
        self
    }

    /// Cap the total stack bytes in use; ignored when a custom allocator is set
    pub fn with_stack_budget(mut self, budget: usize) -> Self {
        self.config.stack_budget = Some(budget);
        self
    }

    pub fn with_join_policy(mut self, policy: JoinPolicy) -> Self {
        self.config.join_policy = policy;
        self
    }

    /// Use a custom interrupt controller
    pub fn with_interrupts(mut self, interrupts: Arc<dyn InterruptController>) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    /// Use a custom stack allocator
    pub fn with_stack_allocator(mut self, stacks: Arc<dyn StackAllocator>) -> Self {
        self.stacks = Some(stacks);
        self
    }

    /// Use a custom execution context backend
    pub fn with_backend(mut self, backend: Arc<dyn ContextBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the configuration and build the Runtime
    pub fn build(self) -> Result<Runtime, ConfigError> {
        self.config.validate()?;

        let interrupts = self
            .interrupts
            .unwrap_or_else(|| Arc::new(SoftInterrupts::default()));
        let stacks = self
            .stacks
            .unwrap_or_else(|| Arc::new(BudgetedStacks::new(self.config.stack_budget)));
        let backend = self.backend.unwrap_or_else(|| Arc::new(CoroutineBackend));

        let runtime = Runtime::assemble(self.config, interrupts, stacks, backend);
        info!(
            "Runtime {} built: {} slots, {} byte stacks",
            runtime.id(),
            runtime.config().max_threads,
            runtime.config().stack_size
        );
        Ok(runtime)
    }
}
