//! Directory listing executor

use crate::context::ExecutionContext;
use crate::executor::{replay_if_terminal, Executor};
use crate::params::{ListDirectoryParams, TaskParameters, TaskType};
use crate::stream::{ResultSender, ResultStream};
use crate::task::{OutputResult, TaskRef};
use async_trait::async_trait;
use weave_foundation::{EngineConfig, Error, Result};

/// Lists one directory: names sorted, directories end in `/`, files carry their size
pub struct ListDirectoryExecutor {
    stream_buffer: usize,
}

impl ListDirectoryExecutor {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            stream_buffer: config.stream_buffer,
        }
    }
}

impl Default for ListDirectoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ListDirectoryExecutor {
    async fn execute(&self, ctx: &ExecutionContext, task: TaskRef) -> Result<ResultStream> {
        if let Some(replay) = replay_if_terminal(&task) {
            return Ok(replay);
        }

        let (task_id, params) = {
            let task = task.read();
            match task.parameters() {
                TaskParameters::ListDirectory(p) => (task.task_id.clone(), p.clone()),
                other => return Err(Error::wrong_executor(self.name(), other.task_type())),
            }
        };
        if params.path.trim().is_empty() {
            return Err(Error::missing_parameter(task_id, "path"));
        }

        let (tx, stream) = ResultStream::open(ctx, &task, self.stream_buffer);
        tokio::spawn(list(tx, params));
        Ok(stream)
    }

    fn task_type(&self) -> TaskType {
        TaskType::ListDirectory
    }
}

struct Entry {
    name: String,
    is_dir: bool,
    size: u64,
}

async fn list(tx: ResultSender, params: ListDirectoryParams) {
    if let Some(err) = tx.context().err() {
        tx.fail_context(err);
        return;
    }
    let task_id = tx.task_id().to_string();

    match read_entries(&params.path).await {
        Ok(entries) => {
            let count = entries.len();
            tx.finish(
                OutputResult::succeeded(
                    task_id,
                    format!("{} entries in {}", count, params.path),
                )
                .with_data(format_entries(&entries)),
            );
        }
        Err(e) => {
            tx.finish(OutputResult::failed(
                task_id,
                format!("failed to list {}", params.path),
                e.to_string(),
            ));
        }
    }
}

async fn read_entries(path: &str) -> std::io::Result<Vec<Entry>> {
    let mut dir = tokio::fs::read_dir(path).await?;
    let mut entries = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: metadata.is_dir(),
            size: metadata.len(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn format_entries(entries: &[Entry]) -> String {
    entries
        .iter()
        .map(|e| {
            if e.is_dir {
                format!("{}/", e.name)
            } else {
                format!("{} ({} bytes)", e.name, e.size)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
