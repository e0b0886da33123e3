//! Patch executor - applies a unified diff to one file
//!
//! A missing target file is treated as empty, so a patch with only
//! additions creates it.

use crate::context::ExecutionContext;
use crate::diff::Patch;
use crate::executor::file_write::write_creating_parents;
use crate::executor::{replay_if_terminal, Executor};
use crate::params::{PatchParams, TaskParameters, TaskType};
use crate::stream::{ResultSender, ResultStream};
use crate::task::{OutputResult, TaskRef};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};
use weave_foundation::{EngineConfig, Error, Result};

pub struct PatchFileExecutor {
    stream_buffer: usize,
}

impl PatchFileExecutor {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            stream_buffer: config.stream_buffer,
        }
    }
}

impl Default for PatchFileExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for PatchFileExecutor {
    async fn execute(&self, ctx: &ExecutionContext, task: TaskRef) -> Result<ResultStream> {
        if let Some(replay) = replay_if_terminal(&task) {
            return Ok(replay);
        }

        let (task_id, params) = {
            let task = task.read();
            match task.parameters() {
                TaskParameters::PatchFile(p) => (task.task_id.clone(), p.clone()),
                other => return Err(Error::wrong_executor(self.name(), other.task_type())),
            }
        };
        if params.path.trim().is_empty() {
            return Err(Error::missing_parameter(task_id, "path"));
        }
        if params.patch.trim().is_empty() {
            return Err(Error::missing_parameter(task_id, "patch"));
        }

        let (tx, stream) = ResultStream::open(ctx, &task, self.stream_buffer);
        tokio::spawn(apply_patch(tx, params));
        Ok(stream)
    }

    fn task_type(&self) -> TaskType {
        TaskType::PatchFile
    }
}

async fn apply_patch(tx: ResultSender, params: PatchParams) {
    if let Some(err) = tx.context().err() {
        tx.fail_context(err);
        return;
    }
    let task_id = tx.task_id().to_string();
    let path = Path::new(&params.path);

    let original = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Task {}: {} does not exist, patching empty content", task_id, params.path);
            String::new()
        }
        Err(e) => {
            tx.finish(OutputResult::failed(
                task_id,
                format!("failed to read {}", params.path),
                e.to_string(),
            ));
            return;
        }
    };

    let patched = Patch::parse(&params.patch).and_then(|patch| {
        let hunks = patch.hunks.len();
        patch.apply(&original).map(|content| (hunks, content))
    });
    let (hunks, content) = match patched {
        Ok(applied) => applied,
        Err(e) => {
            warn!("Task {}: patch rejected for {}: {}", task_id, params.path, e);
            tx.finish(OutputResult::failed(
                task_id,
                format!("failed to apply patch to {}", params.path),
                e.to_string(),
            ));
            return;
        }
    };

    // Last chance to stop before the file changes
    if let Some(err) = tx.context().err() {
        tx.fail_context(err);
        return;
    }

    match write_creating_parents(path, &content).await {
        Ok(()) => {
            tx.finish(OutputResult::succeeded(
                task_id,
                format!("applied {} hunks to {}", hunks, params.path),
            ));
        }
        Err(e) => {
            tx.finish(OutputResult::failed(
                task_id,
                format!("failed to write {}", params.path),
                e.to_string(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TaskStatus;
    use crate::task::Task;

    fn patch_task(path: &Path, patch: &str) -> TaskRef {
        TaskRef::new(Task::new(
            "patch",
            "patch file",
            PatchParams {
                path: path.display().to_string(),
                patch: patch.into(),
            },
        ))
    }

    async fn run(task: TaskRef) -> Vec<OutputResult> {
        PatchFileExecutor::new()
            .execute(&ExecutionContext::new(), task)
            .await
            .unwrap()
            .collect_all()
            .await
    }

    #[tokio::test]
    async fn test_patch_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greet.txt");
        std::fs::write(&path, "hello\nworld\n").unwrap();

        let messages = run(patch_task(&path, "@@ -1,2 +1,2 @@\n hello\n-world\n+there\n")).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, TaskStatus::Succeeded);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\nthere\n");
    }

    #[tokio::test]
    async fn test_patch_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new/file.txt");

        let creation = "--- /dev/null\n+++ b/file.txt\n@@ -0,0 +1 @@\n+created\n";
        let messages = run(patch_task(&path, creation)).await;
        assert_eq!(messages[0].status, TaskStatus::Succeeded);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "created\n");
    }

    #[tokio::test]
    async fn test_mismatch_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        std::fs::write(&path, "original\n").unwrap();

        let task = patch_task(&path, "@@ -1 +1 @@\n-something else\n+replacement\n");
        let messages = run(task.clone()).await;
        assert_eq!(messages[0].status, TaskStatus::Failed);
        assert!(messages[0].error.contains("does not match"));
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original\n");
    }

    #[tokio::test]
    async fn test_replay_does_not_reapply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("once.txt");
        std::fs::write(&path, "a\n").unwrap();

        let task = patch_task(&path, "@@ -1 +1,2 @@\n a\n+b\n");
        run(task.clone()).await;
        let messages = run(task.clone()).await;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], task.output().unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[tokio::test]
    async fn test_missing_patch_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let err = PatchFileExecutor::new()
            .execute(&ExecutionContext::new(), patch_task(&dir.path().join("x"), ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter { parameter: "patch", .. }));
    }
}
