//! Group executor - runs a group's children one at a time, in order
//!
//! ## Flow
//! 1. announce the child count
//! 2. for each child: skip-and-count if already terminal, otherwise dispatch
//!    it through the registry and forward its messages as group progress
//! 3. stop after the first child that fails
//! 4. report one terminal result for the whole group
//!
//! Nested groups are dispatched like any other child type.

use crate::context::ExecutionContext;
use crate::executor::{replay_if_terminal, Executor};
use crate::params::{TaskParameters, TaskType};
use crate::registry::Registry;
use crate::state::TaskStatus;
use crate::stream::{ResultSender, ResultStream};
use crate::task::{OutputResult, TaskRef};
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};
use weave_foundation::{EngineConfig, Error, Result};

/// Sequential, fail-fast composition of child tasks
pub struct GroupExecutor {
    registry: Weak<Registry>,
    stream_buffer: usize,
}

impl GroupExecutor {
    /// `registry` is the registry this executor gets registered in
    pub fn new(registry: Weak<Registry>) -> Self {
        Self::with_config(registry, &EngineConfig::default())
    }

    pub fn with_config(registry: Weak<Registry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            stream_buffer: config.stream_buffer,
        }
    }
}

#[async_trait]
impl Executor for GroupExecutor {
    async fn execute(&self, ctx: &ExecutionContext, task: TaskRef) -> Result<ResultStream> {
        if let Some(replay) = replay_if_terminal(&task) {
            return Ok(replay);
        }

        let (task_id, children) = {
            let task = task.read();
            match task.parameters() {
                TaskParameters::Group => (task.task_id.clone(), task.children().to_vec()),
                other => return Err(Error::wrong_executor(self.name(), other.task_type())),
            }
        };
        if children.is_empty() {
            return Err(Error::EmptyGroup(task_id));
        }
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| Error::Internal("executor registry is no longer available".into()))?;

        let (tx, stream) = ResultStream::open(ctx, &task, self.stream_buffer);
        tokio::spawn(GroupRun::new(registry, children).run(tx));
        Ok(stream)
    }

    fn task_type(&self) -> TaskType {
        TaskType::Group
    }
}

/// Bookkeeping for one group execution
struct GroupRun {
    registry: Arc<Registry>,
    children: Vec<TaskRef>,
    processed: usize,
    failures: usize,
    data: Vec<String>,
    errors: Vec<String>,
}

impl GroupRun {
    fn new(registry: Arc<Registry>, children: Vec<TaskRef>) -> Self {
        Self {
            registry,
            children,
            processed: 0,
            failures: 0,
            data: Vec::new(),
            errors: Vec::new(),
        }
    }

    async fn run(mut self, tx: ResultSender) {
        let ctx = tx.context().clone();
        let group_id = tx.task_id().to_string();
        let total = self.children.len();
        let started = Instant::now();

        info!("Starting group {} with {} tasks", group_id, total);
        let _ = tx
            .progress(format!("starting group with {} tasks", total), "")
            .await;

        let children = std::mem::take(&mut self.children);
        for (index, child) in children.iter().enumerate() {
            if let Some(err) = ctx.err() {
                warn!(
                    "Group {} stopped before task {}: {}",
                    group_id,
                    child.id(),
                    err
                );
                tx.finish(OutputResult::failed(
                    group_id,
                    format!("group cancelled after {}/{} tasks", self.processed, total),
                    err.to_string(),
                ));
                return;
            }

            if child.status().is_terminal() {
                debug!("Group {}: task {} already {}", group_id, child.id(), child.status());
                let stored = child.read().stored_output();
                let data = stored.result_data.clone();
                // Already-failed children are tallied but do not stop the group
                self.record(stored, data);
                continue;
            }

            let (terminal, data) = self.run_child(&tx, &ctx, child, index + 1, total).await;
            let failed = terminal.status != TaskStatus::Succeeded;
            self.record(terminal, data);
            if failed {
                debug!("Group {} stopping after failed task {}", group_id, child.id());
                break;
            }
        }

        let elapsed = started.elapsed();
        let data = self.data.join("\n");
        let result = if self.failures == 0 {
            OutputResult::succeeded(
                group_id.clone(),
                format!("group completed: {} tasks in {:?}", self.processed, elapsed),
            )
            .with_data(data)
        } else {
            OutputResult::failed(
                group_id.clone(),
                format!(
                    "group failed: {}/{} tasks failed in {:?}",
                    self.failures, self.processed, elapsed
                ),
                self.errors.join("\n"),
            )
            .with_data(data)
        };
        info!("Group {} finished: {}", group_id, result.message);
        tx.finish(result);
    }

    fn record(&mut self, terminal: OutputResult, data: String) {
        self.processed += 1;
        self.data.push(data);
        if terminal.status != TaskStatus::Succeeded {
            self.failures += 1;
            self.errors
                .push(format!("task {} failed: {}", terminal.task_id, terminal.error));
        }
    }

    /// Execute one child to completion.
    ///
    /// Returns its terminal result and the data of all its messages joined.
    async fn run_child(
        &self,
        tx: &ResultSender,
        ctx: &ExecutionContext,
        child: &TaskRef,
        position: usize,
        total: usize,
    ) -> (OutputResult, String) {
        let child_id = child.id();
        {
            let mut task = child.write();
            if task.status().is_pending() {
                if let Err(e) = task.set_status(TaskStatus::Running) {
                    warn!("Task {} could not start: {}", child_id, e);
                }
            }
        }

        let child_ctx = ctx.child();
        let stream = match self.registry.get_executor(child.task_type()) {
            Ok(executor) => executor.execute(&child_ctx, child.clone()).await,
            Err(e) => Err(e),
        };
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Task {} could not be executed: {}", child_id, e);
                let failed = OutputResult::failed(
                    child_id.clone(),
                    "task could not be executed",
                    e.to_string(),
                );
                return (settle(child, failed), String::new());
            }
        };

        let mut forwarding = true;
        let mut last = None;
        let mut data = String::new();
        while let Some(message) = stream.recv().await {
            data.push_str(&message.result_data);
            if forwarding {
                let text = if message.message.trim().is_empty() {
                    message.result_data.trim()
                } else {
                    message.message.as_str()
                };
                let line = format!("[{}/{}] {}: {}", position, total, child_id, text);
                if tx.progress(line, "").await.is_err() {
                    forwarding = false;
                }
            }
            last = Some(message);
        }
        child_ctx.cancel();

        let terminal = match last {
            Some(message) if message.is_terminal() => message,
            _ => child.read().stored_output(),
        };
        (settle(child, terminal), data)
    }
}

/// Make sure the child's own record ends terminal
fn settle(child: &TaskRef, terminal: OutputResult) -> OutputResult {
    let mut task = child.write();
    if task.status().is_terminal() {
        return task.stored_output();
    }
    let mut terminal = terminal;
    if !terminal.is_terminal() {
        terminal.status = TaskStatus::Failed;
    }
    task.finish(terminal.clone()).unwrap_or(terminal)
}
