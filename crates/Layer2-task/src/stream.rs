//! Result streams
//!
//! A stream carries zero or more `running` messages followed by exactly one
//! terminal message. Progress travels over a bounded channel; the terminal
//! message has its own slot, so delivering it never blocks on a consumer
//! that stopped reading.

use crate::context::{ContextError, ExecutionContext};
use crate::state::TaskStatus;
use crate::task::{OutputResult, TaskRef};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Receive side of one task's results
#[derive(Debug)]
pub struct ResultStream {
    progress: Option<mpsc::Receiver<OutputResult>>,
    terminal: Option<oneshot::Receiver<OutputResult>>,
}

impl ResultStream {
    /// Open a stream for `task`, marking it running.
    ///
    /// `capacity` bounds the number of undelivered progress messages.
    pub fn open(
        ctx: &ExecutionContext,
        task: &TaskRef,
        capacity: usize,
    ) -> (ResultSender, ResultStream) {
        let (progress_tx, progress_rx) = mpsc::channel(capacity.max(1));
        let (terminal_tx, terminal_rx) = oneshot::channel();

        let sender = ResultSender {
            ctx: ctx.clone(),
            task: task.clone(),
            task_id: task.id(),
            progress: Some(progress_tx),
            terminal: Some(terminal_tx),
        };
        sender.start();

        let stream = ResultStream {
            progress: Some(progress_rx),
            terminal: Some(terminal_rx),
        };
        (sender, stream)
    }

    /// A closed stream holding only `result`
    pub fn from_result(result: OutputResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self {
            progress: None,
            terminal: Some(rx),
        }
    }

    /// Next message; `None` once the terminal message has been taken
    pub async fn recv(&mut self) -> Option<OutputResult> {
        self.next().await
    }

    /// Drain everything, terminal message last
    pub async fn collect_all(mut self) -> Vec<OutputResult> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv().await {
            messages.push(message);
        }
        messages
    }
}

impl Stream for ResultStream {
    type Item = OutputResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(rx) = self.progress.as_mut() {
            match rx.poll_recv(cx) {
                Poll::Ready(Some(message)) => return Poll::Ready(Some(message)),
                Poll::Ready(None) => self.progress = None,
                Poll::Pending => return Poll::Pending,
            }
        }

        if let Some(rx) = self.terminal.as_mut() {
            let polled = Pin::new(rx).poll(cx);
            return match polled {
                Poll::Ready(Ok(message)) => {
                    self.terminal = None;
                    Poll::Ready(Some(message))
                }
                Poll::Ready(Err(_)) => {
                    self.terminal = None;
                    Poll::Ready(None)
                }
                Poll::Pending => Poll::Pending,
            };
        }

        Poll::Ready(None)
    }
}

/// Producer side of one task's results.
///
/// Owned by the single worker executing the task. Every exit path ends in
/// exactly one terminal message: [`finish`](Self::finish) delivers it, and
/// dropping an unfinished sender delivers a synthesized failure.
#[derive(Debug)]
pub struct ResultSender {
    ctx: ExecutionContext,
    task: TaskRef,
    task_id: String,
    progress: Option<mpsc::Sender<OutputResult>>,
    terminal: Option<oneshot::Sender<OutputResult>>,
}

impl ResultSender {
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn start(&self) {
        let mut task = self.task.write();
        if task.status().is_pending() {
            if let Err(e) = task.set_status(TaskStatus::Running) {
                warn!("Task {} could not start: {}", self.task_id, e);
            }
        }
    }

    /// Record and emit a `running` message carrying `data`
    pub async fn progress(
        &self,
        message: impl Into<String>,
        data: impl Into<String>,
    ) -> Result<(), ContextError> {
        self.send(OutputResult::running(self.task_id.clone(), message).with_data(data))
            .await
    }

    /// Emit a non-terminal message, waiting for buffer space unless the
    /// context ends first
    pub async fn send(&self, mut message: OutputResult) -> Result<(), ContextError> {
        message.status = TaskStatus::Running;
        if message.task_id.is_empty() {
            message.task_id = self.task_id.clone();
        }
        let Some(tx) = self.progress.as_ref() else {
            self.task.write().record_output(message);
            return Ok(());
        };

        tokio::select! {
            biased;
            err = self.ctx.wait_err() => Err(err),
            sent = tx.send(message.clone()) => {
                if sent.is_err() {
                    debug!("Consumer of task {} stopped reading", self.task_id);
                }
                self.task.write().record_output(message);
                Ok(())
            }
        }
    }

    /// Record the terminal result on the task and deliver it
    pub fn finish(mut self, result: OutputResult) -> OutputResult {
        self.deliver(result)
    }

    /// Terminal failure for a cancelled or timed-out context
    pub fn fail_context(self, err: ContextError) -> OutputResult {
        let result = OutputResult::failed(self.task_id.clone(), err.describe(), err.to_string());
        self.finish(result)
    }

    fn deliver(&mut self, mut result: OutputResult) -> OutputResult {
        if result.task_id.is_empty() {
            result.task_id = self.task_id.clone();
        }
        if !result.status.is_terminal() {
            warn!(
                "Task {} finished with non-terminal status {}",
                self.task_id, result.status
            );
            result.status = TaskStatus::Failed;
            if result.error.is_empty() {
                result.error = "executor reported a non-terminal final status".to_string();
            }
        }

        let stored = {
            let mut task = self.task.write();
            match task.finish(result.clone()) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Task {}: {}", self.task_id, e);
                    result
                }
            }
        };

        debug!("Task {} finished: {}", self.task_id, stored.status);
        self.progress.take();
        if let Some(tx) = self.terminal.take() {
            let _ = tx.send(stored.clone());
        }
        stored
    }
}

impl Drop for ResultSender {
    fn drop(&mut self) {
        if self.terminal.is_some() {
            warn!("Task {} stopped without reporting a result", self.task_id);
            let result = OutputResult::failed(
                self.task_id.clone(),
                "executor stopped without reporting a result",
                "missing terminal result",
            );
            self.deliver(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::UserInputParams;
    use crate::task::Task;
    use std::time::Duration;

    fn task(id: &str) -> TaskRef {
        TaskRef::new(Task::new(
            id,
            "prompt",
            UserInputParams {
                prompt: "?".into(),
            },
        ))
    }

    #[tokio::test]
    async fn test_progress_then_terminal_then_closed() {
        let ctx = ExecutionContext::new();
        let task = task("t1");
        let (tx, mut stream) = ResultStream::open(&ctx, &task, 4);
        assert_eq!(task.status(), TaskStatus::Running);

        tx.progress("", "a").await.unwrap();
        tx.progress("", "b").await.unwrap();
        tx.finish(OutputResult::succeeded("t1", "done"));

        let messages: Vec<_> = (&mut stream).collect().await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].result_data, "a");
        assert_eq!(messages[1].result_data, "b");
        assert_eq!(messages[2].status, TaskStatus::Succeeded);
        assert!(stream.recv().await.is_none());
        assert!(stream.recv().await.is_none());

        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert_eq!(task.output().unwrap(), messages[2]);
    }

    #[tokio::test]
    async fn test_terminal_delivered_when_buffer_full() {
        let ctx = ExecutionContext::new();
        let task = task("t1");
        let (tx, stream) = ResultStream::open(&ctx, &task, 1);

        tx.progress("", "fills the buffer").await.unwrap();
        ctx.cancel();
        let err = tx.progress("", "blocked").await.unwrap_err();
        assert_eq!(err, ContextError::Cancelled);
        tx.fail_context(err);

        let messages = stream.collect_all().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].status, TaskStatus::Failed);
        assert_eq!(messages[1].error, "context canceled");
    }

    #[tokio::test]
    async fn test_blocked_message_is_not_recorded() {
        let ctx = ExecutionContext::new();
        let task = task("t1");
        let (tx, _stream) = ResultStream::open(&ctx, &task, 1);

        tx.progress("", "delivered").await.unwrap();
        assert_eq!(task.output().unwrap().result_data, "delivered");
        ctx.cancel();
        tx.progress("", "never sent").await.unwrap_err();

        let stored = task.output().unwrap();
        assert_eq!(stored.result_data, "delivered");
        assert_eq!(stored.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_dropped_sender_reports_failure() {
        let ctx = ExecutionContext::new();
        let task = task("t1");
        let (tx, stream) = ResultStream::open(&ctx, &task, 2);
        tokio::spawn(async move {
            let _owned = tx;
            panic!("worker crashed");
        });

        let messages = tokio::time::timeout(Duration::from_secs(5), stream.collect_all())
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, TaskStatus::Failed);
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_non_terminal_finish_is_coerced() {
        let ctx = ExecutionContext::new();
        let task = task("t1");
        let (tx, stream) = ResultStream::open(&ctx, &task, 2);
        tx.finish(OutputResult::running("t1", "still going"));

        let messages = stream.collect_all().await;
        assert_eq!(messages[0].status, TaskStatus::Failed);
        assert!(!messages[0].error.is_empty());
    }

    #[tokio::test]
    async fn test_from_result() {
        let stream = ResultStream::from_result(OutputResult::succeeded("x", "ok"));
        let messages = stream.collect_all().await;
        assert_eq!(messages, vec![OutputResult::succeeded("x", "ok")]);
    }
}
