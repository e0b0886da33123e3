//! Task definition and types
//!
//! A [`Task`] is a node in a task tree. Group tasks own their children
//! through [`TaskRef`] handles, so whoever holds a child's handle sees the
//! child's status change in place as the group executes it.

use crate::params::{TaskParameters, TaskType};
use crate::state::TaskStatus;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use weave_foundation::{Error, Result};

// ============================================================================
// OutputResult
// ============================================================================

/// A point-in-time or final report for one task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputResult {
    #[serde(default)]
    pub task_id: String,

    #[serde(default)]
    pub status: TaskStatus,

    /// Human-readable summary
    #[serde(default)]
    pub message: String,

    /// Machine-readable error, empty on success
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// Operation payload: full content, or one chunk for streamed output
    #[serde(rename = "resultData", default, skip_serializing_if = "String::is_empty")]
    pub result_data: String,
}

impl OutputResult {
    pub fn new(task_id: impl Into<String>, status: TaskStatus, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            message: message.into(),
            error: String::new(),
            result_data: String::new(),
        }
    }

    /// Non-terminal progress report
    pub fn running(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(task_id, TaskStatus::Running, message)
    }

    pub fn succeeded(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(task_id, TaskStatus::Succeeded, message)
    }

    pub fn failed(
        task_id: impl Into<String>,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(task_id, TaskStatus::Failed, message).with_error(error)
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.result_data = data.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ============================================================================
// Task
// ============================================================================

/// A unit of work: a leaf operation or an ordered group of sub-tasks
#[derive(Debug)]
pub struct Task {
    /// Caller-assigned identifier (uniqueness is the caller's concern)
    pub task_id: String,

    /// Human-readable description
    pub description: String,

    status: TaskStatus,
    parameters: TaskParameters,
    children: Vec<TaskRef>,
    output: Option<OutputResult>,
}

impl Task {
    /// Create a pending leaf task
    pub fn new(
        task_id: impl Into<String>,
        description: impl Into<String>,
        parameters: impl Into<TaskParameters>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            parameters: parameters.into(),
            children: Vec::new(),
            output: None,
        }
    }

    /// Create a pending group task
    pub fn group(
        task_id: impl Into<String>,
        description: impl Into<String>,
        children: impl IntoIterator<Item = Task>,
    ) -> Self {
        let mut task = Self::new(task_id, description, TaskParameters::Group);
        task.children = children.into_iter().map(TaskRef::new).collect();
        task
    }

    /// Set the status directly, e.g. when rebuilding a partially executed plan
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        if let Some(output) = self.output.as_mut() {
            output.status = status;
        }
        self
    }

    pub fn with_output(mut self, output: OutputResult) -> Self {
        self.record_output(output);
        self
    }

    pub fn with_child(mut self, child: Task) -> Self {
        self.children.push(TaskRef::new(child));
        self
    }

    /// Append a child and return its handle
    pub fn push_child(&mut self, child: impl Into<TaskRef>) -> TaskRef {
        let child = child.into();
        self.children.push(child.clone());
        child
    }

    pub fn task_type(&self) -> TaskType {
        self.parameters.task_type()
    }

    pub fn is_group(&self) -> bool {
        self.task_type() == TaskType::Group
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn parameters(&self) -> &TaskParameters {
        &self.parameters
    }

    pub fn children(&self) -> &[TaskRef] {
        &self.children
    }

    pub fn output(&self) -> Option<&OutputResult> {
        self.output.as_ref()
    }

    /// Move to `next`, refusing to leave a terminal state
    pub fn set_status(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                task_id: self.task_id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if let Some(output) = self.output.as_mut() {
            output.status = next;
        }
        Ok(())
    }

    /// Store a snapshot, re-stamped with the task's current status
    pub fn record_output(&mut self, mut output: OutputResult) {
        output.status = self.status;
        self.output = Some(output);
    }

    /// Apply a terminal (or progress) result: status first, then snapshot
    pub fn finish(&mut self, output: OutputResult) -> Result<OutputResult> {
        self.set_status(output.status)?;
        self.record_output(output);
        Ok(self.stored_output())
    }

    /// Stored output, or a bare report carrying id and status
    pub fn stored_output(&self) -> OutputResult {
        match &self.output {
            Some(output) => output.clone(),
            None => OutputResult::new(self.task_id.clone(), self.status, String::new()),
        }
    }

    /// Return the whole tree to pending and drop recorded outputs
    pub fn reset(&mut self) {
        self.status = TaskStatus::Pending;
        self.output = None;
        for child in &self.children {
            child.write().reset();
        }
    }

    /// Pre-order visit with depth (root is depth 0)
    pub fn walk(&self, visit: &mut dyn FnMut(usize, &Task)) {
        self.walk_at(0, visit);
    }

    fn walk_at(&self, depth: usize, visit: &mut dyn FnMut(usize, &Task)) {
        visit(depth, self);
        for child in &self.children {
            child.read().walk_at(depth + 1, visit);
        }
    }

    /// Status counts over the tree, this task included
    pub fn summary(&self) -> TaskSummary {
        let mut summary = TaskSummary::default();
        self.walk(&mut |_, task| summary.count(task.status()));
        summary
    }
}

/// Status counts for a task tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl TaskSummary {
    fn count(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Succeeded => self.succeeded += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for TaskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks: {} succeeded, {} failed, {} running, {} pending",
            self.total, self.succeeded, self.failed, self.running, self.pending
        )
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
struct TaskWire<'a> {
    task_id: &'a str,
    description: &'a str,
    status: TaskStatus,
    #[serde(rename = "type")]
    task_type: TaskType,
    children: &'a [TaskRef],
    parameters: &'a TaskParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a OutputResult>,
}

#[derive(Deserialize)]
struct RawTask {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: TaskStatus,
    #[serde(rename = "type")]
    task_type: TaskType,
    #[serde(default)]
    children: Option<Vec<TaskRef>>,
    #[serde(default)]
    parameters: serde_json::Value,
    #[serde(default)]
    output: Option<OutputResult>,
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        TaskWire {
            task_id: &self.task_id,
            description: &self.description,
            status: self.status,
            task_type: self.task_type(),
            children: &self.children,
            parameters: &self.parameters,
            output: self.output.as_ref(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;

        let raw = RawTask::deserialize(deserializer)?;
        let parameters = TaskParameters::from_value(raw.task_type, raw.parameters)
            .map_err(|e| D::Error::custom(format!("task {}: {}", raw.task_id, e)))?;
        let children = raw.children.unwrap_or_default();

        if raw.task_type != TaskType::Group && !children.is_empty() {
            return Err(D::Error::custom(format!(
                "task {}: only group tasks may have children",
                raw.task_id
            )));
        }

        let mut task = Task {
            task_id: raw.task_id,
            description: raw.description,
            status: raw.status,
            parameters,
            children,
            output: None,
        };
        if let Some(output) = raw.output {
            task.record_output(output);
        }
        Ok(task)
    }
}

// ============================================================================
// TaskRef
// ============================================================================

/// Shared handle to a task.
///
/// Only the executor currently running a task writes through its handle;
/// everyone else reads. Guards must never be held across an `.await`.
#[derive(Clone)]
pub struct TaskRef(Arc<RwLock<Task>>);

impl TaskRef {
    pub fn new(task: Task) -> Self {
        Self(Arc::new(RwLock::new(task)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Task> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Task> {
        self.0.write()
    }

    pub fn id(&self) -> String {
        self.read().task_id.clone()
    }

    pub fn status(&self) -> TaskStatus {
        self.read().status()
    }

    pub fn task_type(&self) -> TaskType {
        self.read().task_type()
    }

    pub fn output(&self) -> Option<OutputResult> {
        self.read().output().cloned()
    }

    /// Handles of the direct children
    pub fn children(&self) -> Vec<TaskRef> {
        self.read().children().to_vec()
    }

    /// Both handles point at the same task
    pub fn ptr_eq(&self, other: &TaskRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Task> for TaskRef {
    fn from(task: Task) -> Self {
        TaskRef::new(task)
    }
}

impl fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Some(task) => task.fmt(f),
            None => f.write_str("TaskRef(<locked>)"),
        }
    }
}

impl Serialize for TaskRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.read().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TaskRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Task::deserialize(deserializer).map(TaskRef::new)
    }
}
