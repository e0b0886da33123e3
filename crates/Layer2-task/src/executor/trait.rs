//! Executor trait

use crate::context::ExecutionContext;
use crate::params::TaskType;
use crate::stream::ResultStream;
use crate::task::TaskRef;
use async_trait::async_trait;
use weave_foundation::Result;

/// Executor trait - implement to add a new operation kind.
///
/// `execute` returns as soon as the work is accepted. An `Err` means the
/// request itself is malformed (wrong type, missing parameter, empty group)
/// and no stream exists. Everything that goes wrong while running is
/// reported as the stream's terminal `failed` message instead.
///
/// The stream yields zero or more `running` messages, then exactly one
/// terminal message, then closes. The task's status and output are kept in
/// step with what the stream reports.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Start executing `task` under `ctx`
    async fn execute(&self, ctx: &ExecutionContext, task: TaskRef) -> Result<ResultStream>;

    /// The task type this executor accepts
    fn task_type(&self) -> TaskType;

    /// Get executor name
    fn name(&self) -> &'static str {
        self.task_type().as_str()
    }
}
