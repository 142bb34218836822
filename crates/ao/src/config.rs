//! Active object configuration.

use core::fmt;
use std::sync::Arc;

/// Stack requested for a worker thread unless configured otherwise.
pub const DEFAULT_STACK_SIZE: usize = 512 * 1024;

/// Function run by the worker when its queue yields nothing.
pub type BackgroundTask = Arc<dyn Fn() + Send + Sync + 'static>;

/// Immutable configuration supplied once when an active object is built.
#[derive(Clone)]
pub struct ActiveObjectConfig {
    pub name: &'static str,
    pub stack_size: usize,
    pub background_task: BackgroundTask,
}

impl Default for ActiveObjectConfig {
    fn default() -> Self {
        Self {
            name: "active",
            stack_size: DEFAULT_STACK_SIZE,
            background_task: Arc::new(|| {}),
        }
    }
}

impl fmt::Debug for ActiveObjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveObjectConfig")
            .field("name", &self.name)
            .field("stack_size", &self.stack_size)
            .finish_non_exhaustive()
    }
}

impl ActiveObjectConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ActiveObjectConfigBuilder {
        ActiveObjectConfigBuilder::default()
    }

    pub fn new<F>(background_task: F, stack_size: usize) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            stack_size,
            background_task: Arc::new(background_task),
            ..Self::default()
        }
    }
}

/// Builder for ergonomic configuration construction.
#[derive(Debug, Clone, Default)]
pub struct ActiveObjectConfigBuilder {
    config: ActiveObjectConfig,
}

impl ActiveObjectConfigBuilder {
    /// Sets the worker thread name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the worker stack size in bytes.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = size;
        self
    }

    /// Sets the function run whenever the queue is idle.
    pub fn background_task<F>(mut self, task: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.config.background_task = Arc::new(task);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ActiveObjectConfig {
        self.config
    }
}
