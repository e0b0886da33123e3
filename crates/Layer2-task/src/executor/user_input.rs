//! User input request executor
//!
//! Collecting the answer is the caller's job. The executor only hands the
//! prompt back as its result.

use crate::context::ExecutionContext;
use crate::executor::{replay_if_terminal, Executor};
use crate::params::{TaskParameters, TaskType};
use crate::stream::ResultStream;
use crate::task::{OutputResult, TaskRef};
use async_trait::async_trait;
use weave_foundation::{EngineConfig, Error, Result};

pub struct RequestUserInputExecutor {
    stream_buffer: usize,
}

impl RequestUserInputExecutor {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            stream_buffer: config.stream_buffer,
        }
    }
}

impl Default for RequestUserInputExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for RequestUserInputExecutor {
    async fn execute(&self, ctx: &ExecutionContext, task: TaskRef) -> Result<ResultStream> {
        if let Some(replay) = replay_if_terminal(&task) {
            return Ok(replay);
        }

        let (task_id, prompt) = {
            let task = task.read();
            match task.parameters() {
                TaskParameters::RequestUserInput(p) => (task.task_id.clone(), p.prompt.clone()),
                other => return Err(Error::wrong_executor(self.name(), other.task_type())),
            }
        };
        if prompt.trim().is_empty() {
            return Err(Error::missing_parameter(task_id, "prompt"));
        }

        let (tx, stream) = ResultStream::open(ctx, &task, self.stream_buffer);
        match ctx.err() {
            Some(err) => {
                tx.fail_context(err);
            }
            None => {
                tx.finish(
                    OutputResult::succeeded(task_id, "user input requested").with_data(prompt),
                );
            }
        }
        Ok(stream)
    }

    fn task_type(&self) -> TaskType {
        TaskType::RequestUserInput
    }
}
