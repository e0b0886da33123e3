//! Executor Registry - maps task types to executors

use crate::context::ExecutionContext;
use crate::executor::{
    Executor, FileReadExecutor, FileWriteExecutor, GroupExecutor, ListDirectoryExecutor,
    PatchFileExecutor, RequestUserInputExecutor, ShellExecutor,
};
use crate::params::TaskType;
use crate::stream::ResultStream;
use crate::task::TaskRef;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use weave_foundation::{EngineConfig, Error, Result};

/// Registry of executors, one per task type
///
/// Lookups take a read lock, registration a write lock.
#[derive(Default)]
pub struct Registry {
    executors: RwLock<HashMap<TaskType, Arc<dyn Executor>>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every standard executor, the group engine included
    pub fn with_standard_executors(config: &EngineConfig) -> Arc<Self> {
        let registry = Arc::new(Self::new());

        registry.register_executor(Arc::new(ShellExecutor::with_config(config)));
        registry.register_executor(Arc::new(FileReadExecutor::with_config(config)));
        registry.register_executor(Arc::new(FileWriteExecutor::with_config(config)));
        registry.register_executor(Arc::new(PatchFileExecutor::with_config(config)));
        registry.register_executor(Arc::new(ListDirectoryExecutor::with_config(config)));
        registry.register_executor(Arc::new(RequestUserInputExecutor::with_config(config)));
        registry.register_executor(Arc::new(GroupExecutor::with_config(
            Arc::downgrade(&registry),
            config,
        )));

        registry
    }

    /// Bind `executor` to `task_type`, replacing any previous binding
    pub fn register(&self, task_type: TaskType, executor: Arc<dyn Executor>) {
        debug!("Registering executor {} for {}", executor.name(), task_type);
        self.executors.write().insert(task_type, executor);
    }

    /// Bind `executor` to the type it reports
    pub fn register_executor(&self, executor: Arc<dyn Executor>) {
        self.register(executor.task_type(), executor);
    }

    pub fn get_executor(&self, task_type: TaskType) -> Result<Arc<dyn Executor>> {
        self.executors
            .read()
            .get(&task_type)
            .cloned()
            .ok_or_else(|| Error::ExecutorNotFound(task_type.to_string()))
    }

    pub fn contains(&self, task_type: TaskType) -> bool {
        self.executors.read().contains_key(&task_type)
    }

    /// Registered types in declaration order
    pub fn task_types(&self) -> Vec<TaskType> {
        let executors = self.executors.read();
        TaskType::ALL
            .into_iter()
            .filter(|t| executors.contains_key(t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.executors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.read().is_empty()
    }

    /// Resolve the task's executor and run it
    pub async fn execute(&self, ctx: &ExecutionContext, task: TaskRef) -> Result<ResultStream> {
        let executor = self.get_executor(task.task_type())?;
        executor.execute(ctx, task).await
    }
}
