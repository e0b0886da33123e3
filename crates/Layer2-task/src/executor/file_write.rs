//! File write executor - create or truncate, then write

use crate::context::ExecutionContext;
use crate::executor::{replay_if_terminal, Executor};
use crate::params::{FileWriteParams, TaskParameters, TaskType};
use crate::stream::{ResultSender, ResultStream};
use crate::task::{OutputResult, TaskRef};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;
use weave_foundation::{EngineConfig, Error, Result};

pub struct FileWriteExecutor {
    stream_buffer: usize,
}

impl FileWriteExecutor {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            stream_buffer: config.stream_buffer,
        }
    }
}

impl Default for FileWriteExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for FileWriteExecutor {
    async fn execute(&self, ctx: &ExecutionContext, task: TaskRef) -> Result<ResultStream> {
        if let Some(replay) = replay_if_terminal(&task) {
            return Ok(replay);
        }

        let (task_id, params) = {
            let task = task.read();
            match task.parameters() {
                TaskParameters::FileWrite(p) => (task.task_id.clone(), p.clone()),
                other => return Err(Error::wrong_executor(self.name(), other.task_type())),
            }
        };
        if params.path.trim().is_empty() {
            return Err(Error::missing_parameter(task_id, "path"));
        }

        let (tx, stream) = ResultStream::open(ctx, &task, self.stream_buffer);
        tokio::spawn(write_file(tx, params));
        Ok(stream)
    }

    fn task_type(&self) -> TaskType {
        TaskType::FileWrite
    }
}

async fn write_file(tx: ResultSender, params: FileWriteParams) {
    if let Some(err) = tx.context().err() {
        tx.fail_context(err);
        return;
    }
    let task_id = tx.task_id().to_string();

    match write_creating_parents(Path::new(&params.path), &params.content).await {
        Ok(()) => {
            debug!("Task {} wrote {} bytes to {}", task_id, params.content.len(), params.path);
            tx.finish(OutputResult::succeeded(
                task_id,
                format!("wrote {} bytes to {}", params.content.len(), params.path),
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

/// Write `content`, creating missing parent directories first
pub(crate) async fn write_creating_parents(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TaskStatus;
    use crate::task::Task;

    fn write_task(path: &Path, content: &str) -> TaskRef {
        TaskRef::new(Task::new(
            "write",
            "write file",
            FileWriteParams {
                path: path.display().to_string(),
                content: content.into(),
            },
        ))
    }

    #[tokio::test]
    async fn test_creates_parents_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/out.txt");
        let executor = FileWriteExecutor::new();
        let ctx = ExecutionContext::new();

        let messages = executor
            .execute(&ctx, write_task(&path, "a much longer first version"))
            .await
            .unwrap()
            .collect_all()
            .await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, TaskStatus::Succeeded);

        executor
            .execute(&ctx, write_task(&path, "short"))
            .await
            .unwrap()
            .collect_all()
            .await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short");
    }

    #[tokio::test]
    async fn test_write_into_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let task = write_task(&blocker.join("child.txt"), "data");
        let messages = FileWriteExecutor::new()
            .execute(&ExecutionContext::new(), task.clone())
            .await
            .unwrap()
            .collect_all()
            .await;
        assert_eq!(messages[0].status, TaskStatus::Failed);
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_replay_does_not_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("untouched.txt");
        let task = TaskRef::new(
            Task::new(
                "write",
                "write",
                FileWriteParams {
                    path: path.display().to_string(),
                    content: "data".into(),
                },
            )
            .with_status(TaskStatus::Succeeded),
        );

        FileWriteExecutor::new()
            .execute(&ExecutionContext::new(), task)
            .await
            .unwrap()
            .collect_all()
            .await;
        assert!(!path.exists());
    }
}
