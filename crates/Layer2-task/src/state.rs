//! Task status state machine
//!
//! `pending -> running -> {succeeded, failed}`. Terminal states are final.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Execution status of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Not started yet (also the wire value `""`)
    #[default]
    Pending,

    /// Currently executing
    Running,

    /// Finished successfully
    Succeeded,

    /// Finished with an error
    Failed,
}

impl TaskStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Pending)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TaskStatus::Running)
    }

    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Succeeded)
    }

    /// Whether `next` is reachable without moving backwards
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            TaskStatus::Pending => true,
            TaskStatus::Running => !next.is_pending(),
            TaskStatus::Succeeded | TaskStatus::Failed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }

    /// Get a symbol for the status (for terminal output)
    pub fn symbol(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "◯",
            TaskStatus::Running => "⟳",
            TaskStatus::Succeeded => "✓",
            TaskStatus::Failed => "✗",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Succeeded));
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Succeeded.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn test_empty_string_is_pending() {
        let status: TaskStatus = serde_json::from_str(r#""""#).unwrap();
        assert!(status.is_pending());

        let status: TaskStatus = serde_json::from_str("null").unwrap();
        assert!(status.is_pending());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&TaskStatus::Succeeded).unwrap(), r#""succeeded""#);
        let status: TaskStatus = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(status, TaskStatus::Failed);
        assert!(serde_json::from_str::<TaskStatus>(r#""done""#).is_err());
    }
}
