//! Plan files - a task tree stored as JSON

use anyhow::Context;
use std::path::Path;
use weave_task::{Task, TaskRef};

/// Load a plan, giving every task without an id a fresh short one
pub fn load(path: &Path) -> anyhow::Result<TaskRef> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read plan {}", path.display()))?;
    let mut task: Task = serde_json::from_str(&content)
        .with_context(|| format!("Invalid plan {}", path.display()))?;
    assign_ids(&mut task);
    Ok(TaskRef::new(task))
}

pub fn save(path: &Path, root: &TaskRef) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(root)?;
    std::fs::write(path, content)
        .with_context(|| format!("Cannot write plan {}", path.display()))?;
    Ok(())
}

fn assign_ids(task: &mut Task) {
    if task.task_id.trim().is_empty() {
        task.task_id = short_id();
    }
    for child in task.children() {
        assign_ids(&mut child.write());
    }
}

fn short_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_task::TaskStatus;

    const PLAN: &str = r#"{
        "type": "group",
        "description": "setup",
        "children": [
            {"task_id": "hello", "type": "request-user-input", "parameters": {"prompt": "hi"}},
            {"type": "list-directory", "status": "succeeded", "parameters": {"path": "."}}
        ]
    }"#;

    #[test]
    fn test_load_assigns_missing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, PLAN).unwrap();

        let root = load(&path).unwrap();
        assert_eq!(root.id().len(), 8);
        let children = root.children();
        assert_eq!(children[0].id(), "hello");
        assert_eq!(children[1].id().len(), 8);
        assert_eq!(children[1].status(), TaskStatus::Succeeded);
    }

    #[test]
    fn test_save_round_trips_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, PLAN).unwrap();

        let root = load(&path).unwrap();
        save(&path, &root).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.id(), root.id());
        assert_eq!(reloaded.children()[1].id(), root.children()[1].id());
    }

    #[test]
    fn test_invalid_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, r#"{"type": "nope"}"#).unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid plan"));
    }
}
