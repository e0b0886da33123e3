//! File read executor - streams file content in chunks

use crate::context::ExecutionContext;
use crate::executor::{replay_if_terminal, Executor};
use crate::params::{FileReadParams, TaskParameters, TaskType};
use crate::stream::{ResultSender, ResultStream};
use crate::task::{OutputResult, TaskRef};
use async_trait::async_trait;
use tracing::debug;
use weave_foundation::{EngineConfig, Error, Result};

/// Reads a whole file or a 1-based inclusive line range
pub struct FileReadExecutor {
    chunk_size: usize,
    stream_buffer: usize,
}

impl FileReadExecutor {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            chunk_size: config.read_chunk_size.max(1),
            stream_buffer: config.stream_buffer,
        }
    }
}

impl Default for FileReadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for FileReadExecutor {
    async fn execute(&self, ctx: &ExecutionContext, task: TaskRef) -> Result<ResultStream> {
        if let Some(replay) = replay_if_terminal(&task) {
            return Ok(replay);
        }

        let (task_id, params) = {
            let task = task.read();
            match task.parameters() {
                TaskParameters::FileRead(p) => (task.task_id.clone(), p.clone()),
                other => return Err(Error::wrong_executor(self.name(), other.task_type())),
            }
        };
        if params.path.trim().is_empty() {
            return Err(Error::missing_parameter(task_id, "path"));
        }

        let (tx, stream) = ResultStream::open(ctx, &task, self.stream_buffer);
        tokio::spawn(read_file(tx, params, self.chunk_size));
        Ok(stream)
    }

    fn task_type(&self) -> TaskType {
        TaskType::FileRead
    }
}

async fn read_file(tx: ResultSender, params: FileReadParams, chunk_size: usize) {
    if let Some(err) = tx.context().err() {
        tx.fail_context(err);
        return;
    }
    let task_id = tx.task_id().to_string();

    let content = match tokio::fs::read_to_string(&params.path).await {
        Ok(content) => content,
        Err(e) => {
            tx.finish(OutputResult::failed(
                task_id,
                format!("failed to read {}", params.path),
                e.to_string(),
            ));
            return;
        }
    };

    let (selected, lines) = match select_lines(&content, params.start_line, params.end_line) {
        Ok(selection) => selection,
        Err(reason) => {
            tx.finish(OutputResult::failed(
                task_id,
                format!("failed to read {}", params.path),
                reason,
            ));
            return;
        }
    };

    for chunk in chunks(selected, chunk_size) {
        if let Err(err) = tx.progress("", chunk).await {
            tx.fail_context(err);
            return;
        }
    }

    debug!("Task {} read {} bytes from {}", task_id, selected.len(), params.path);
    tx.finish(OutputResult::succeeded(
        task_id,
        format!("read {} lines ({} bytes) from {}", lines, selected.len(), params.path),
    ));
}

/// Slice out lines `start..=end` (1-based), line endings kept.
///
/// Returns the slice and the number of lines it holds.
fn select_lines(
    content: &str,
    start: Option<usize>,
    end: Option<usize>,
) -> std::result::Result<(&str, usize), String> {
    if start.is_none() && end.is_none() {
        return Ok((content, content.lines().count()));
    }

    let start = start.unwrap_or(1).max(1);
    if let Some(end) = end {
        if end < start {
            return Err(format!("invalid line range {}-{}", start, end));
        }
    }
    // An empty file reads as empty from its first line
    if content.is_empty() && start == 1 {
        return Ok(("", 0));
    }

    // Byte offset at which each line begins
    let mut offsets = vec![0];
    offsets.extend(
        content
            .match_indices('\n')
            .map(|(i, _)| i + 1)
            .filter(|&i| i < content.len()),
    );
    let total = if content.is_empty() { 0 } else { offsets.len() };

    if start > total {
        return Err(format!(
            "start line {} is past the end of the file ({} lines)",
            start, total
        ));
    }
    let end = end.unwrap_or(total).min(total);

    let from = offsets[start - 1];
    let to = if end < total {
        offsets[end]
    } else {
        content.len()
    };
    Ok((&content[from..to], end - start + 1))
}

/// Split into pieces of at most `size` bytes, never inside a character
fn chunks(text: &str, size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut cut = size.min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut += 1;
        }
        let (head, tail) = rest.split_at(cut);
        pieces.push(head);
        rest = tail;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::combine;
    use crate::state::TaskStatus;
    use crate::task::Task;

    fn read_task(path: &str, start: Option<usize>, end: Option<usize>) -> TaskRef {
        TaskRef::new(Task::new(
            "read",
            "read file",
            FileReadParams {
                path: path.into(),
                start_line: start,
                end_line: end,
            },
        ))
    }

    #[test]
    fn test_select_lines() {
        let text = "one\ntwo\nthree\n";
        assert_eq!(select_lines(text, None, None).unwrap(), (text, 3));
        assert_eq!(select_lines(text, Some(2), Some(2)).unwrap(), ("two\n", 1));
        assert_eq!(select_lines(text, Some(2), None).unwrap(), ("two\nthree\n", 2));
        assert_eq!(select_lines(text, None, Some(9)).unwrap(), (text, 3));
        assert!(select_lines(text, Some(4), None).is_err());
        assert!(select_lines(text, Some(3), Some(1)).is_err());
        assert_eq!(select_lines("a\nb", Some(2), None).unwrap(), ("b", 1));

        assert_eq!(select_lines("", Some(1), None).unwrap(), ("", 0));
        assert_eq!(select_lines("", Some(1), Some(5)).unwrap(), ("", 0));
        assert!(select_lines("", Some(2), None).is_err());
    }

    #[test]
    fn test_chunks_respect_char_boundaries() {
        let text = "aé€b";
        let pieces = chunks(text, 2);
        assert_eq!(pieces.concat(), text);
        assert!(pieces.iter().all(|p| !p.is_empty()));
        assert!(chunks("", 4).is_empty());
    }

    #[tokio::test]
    async fn test_reassembled_by_combinator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let body = "line\n".repeat(100);
        std::fs::write(&path, &body).unwrap();

        let config = EngineConfig::default().read_chunk_size(16);
        let executor = FileReadExecutor::with_config(&config);
        let ctx = ExecutionContext::new();
        let task = read_task(path.to_str().unwrap(), None, None);

        let stream = executor.execute(&ctx, task.clone()).await.unwrap();
        let result = combine(&ctx, stream).await;
        assert_eq!(result.status, TaskStatus::Succeeded);
        assert_eq!(result.result_data, body);
        assert_eq!(task.status(), TaskStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_line_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "a\nb\nc\nd\n").unwrap();

        let executor = FileReadExecutor::new();
        let ctx = ExecutionContext::new();
        let task = read_task(path.to_str().unwrap(), Some(2), Some(3));
        let result = combine(&ctx, executor.execute(&ctx, task).await.unwrap()).await;
        assert_eq!(result.result_data, "b\nc\n");
    }

    #[tokio::test]
    async fn test_empty_file_from_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        let ctx = ExecutionContext::new();
        let task = read_task(path.to_str().unwrap(), Some(1), None);
        let messages = FileReadExecutor::new()
            .execute(&ctx, task)
            .await
            .unwrap()
            .collect_all()
            .await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, TaskStatus::Succeeded);
        assert!(messages[0].message.starts_with("read 0 lines"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_at_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        let executor = FileReadExecutor::new();
        let ctx = ExecutionContext::new();

        let messages = executor
            .execute(&ctx, read_task(path.to_str().unwrap(), None, None))
            .await
            .unwrap()
            .collect_all()
            .await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, TaskStatus::Failed);
        assert!(!messages[0].error.is_empty());
    }

    #[tokio::test]
    async fn test_empty_path_is_structural() {
        let executor = FileReadExecutor::new();
        let err = executor
            .execute(&ExecutionContext::new(), read_task("", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter { parameter: "path", .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "data").unwrap();

        let ctx = ExecutionContext::new();
        ctx.cancel();
        let messages = FileReadExecutor::new()
            .execute(&ctx, read_task(path.to_str().unwrap(), None, None))
            .await
            .unwrap()
            .collect_all()
            .await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].error, "context canceled");
    }
}
