//! Error types for taskweave
//!
//! Every synchronous failure in the workspace is expressed as [`Error`].
//! Runtime failures of an operation are *not* errors: they travel as a
//! terminal `failed` result on the task's stream.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// taskweave error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Structural task errors (returned before any stream exists)
    // ========================================================================
    #[error("Executor '{executor}' cannot run tasks of type '{task_type}'")]
    WrongExecutor {
        executor: &'static str,
        task_type: String,
    },

    #[error("Task {task_id}: missing required parameter '{parameter}'")]
    MissingParameter {
        task_id: String,
        parameter: &'static str,
    },

    #[error("Group task {0} has no children")]
    EmptyGroup(String),

    #[error("No executor registered for task type '{0}'")]
    ExecutorNotFound(String),

    #[error("Task {task_id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    // ========================================================================
    // General
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Task routed to an executor of another type
    pub fn wrong_executor(executor: &'static str, task_type: impl ToString) -> Self {
        Error::WrongExecutor {
            executor,
            task_type: task_type.to_string(),
        }
    }

    /// Required parameter absent or blank
    pub fn missing_parameter(task_id: impl Into<String>, parameter: &'static str) -> Self {
        Error::MissingParameter {
            task_id: task_id.into(),
            parameter,
        }
    }

    /// Whether this error describes a malformed request rather than an
    /// environment failure
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::WrongExecutor { .. }
                | Error::MissingParameter { .. }
                | Error::EmptyGroup(_)
                | Error::ExecutorNotFound(_)
                | Error::InvalidTransition { .. }
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
