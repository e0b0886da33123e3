//! Shell executor - runs a command line through the configured shell
//!
//! Features:
//! - stdout/stderr merged and streamed line by line as `running` chunks
//! - exit code and final working directory in the terminal message
//! - optional wall-clock cap layered beneath the caller's context
//! - the whole process group is killed when the context is cancelled or times out

use crate::context::ExecutionContext;
use crate::executor::{replay_if_terminal, Executor};
use crate::params::{ShellParams, TaskParameters, TaskType};
use crate::stream::{ResultSender, ResultStream};
use crate::task::{OutputResult, TaskRef};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use weave_foundation::{EngineConfig, Error, Result, ShellSettings};

/// Prefix of the line that reports the shell's final directory
const CWD_MARKER: &str = "__WEAVE_CWD__:";

/// Lines buffered between the pipe readers and the stream
const LINE_BUFFER: usize = 64;

/// Shell command executor
pub struct ShellExecutor {
    settings: ShellSettings,
    stream_buffer: usize,
}

impl ShellExecutor {
    /// Create with default configuration
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            settings: config.shell.clone(),
            stream_buffer: config.stream_buffer,
        }
    }

    fn timeout_for(&self, params: &ShellParams) -> Option<Duration> {
        params
            .timeout_secs
            .or(self.settings.default_timeout_secs)
            .map(Duration::from_secs)
    }

    /// Wrap the command so a POSIX shell prints its final `pwd` last
    fn script(command: &str) -> String {
        if cfg!(windows) {
            return command.to_string();
        }
        format!(
            "{}\n__weave_status=$?\nprintf '%s%s\\n' '{}' \"$(pwd)\"\nexit $__weave_status",
            command, CWD_MARKER
        )
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(&self, ctx: &ExecutionContext, task: TaskRef) -> Result<ResultStream> {
        if let Some(replay) = replay_if_terminal(&task) {
            return Ok(replay);
        }

        let (task_id, params) = {
            let task = task.read();
            match task.parameters() {
                TaskParameters::ShellExec(p) => (task.task_id.clone(), p.clone()),
                other => return Err(Error::wrong_executor(self.name(), other.task_type())),
            }
        };
        if params.command.trim().is_empty() {
            return Err(Error::missing_parameter(task_id, "command"));
        }

        let run_ctx = match self.timeout_for(&params) {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.child(),
        };
        let (tx, stream) = ResultStream::open(&run_ctx, &task, self.stream_buffer);

        let invocation = Invocation {
            program: self.settings.program().to_string(),
            flag: self.settings.flag().to_string(),
            script: Self::script(&params.command),
            command: params.command,
            working_dir: params.working_dir,
        };

        info!("Executing task {}: {}", task_id, invocation.command);
        tokio::spawn(invocation.run(tx));
        Ok(stream)
    }

    fn task_type(&self) -> TaskType {
        TaskType::ShellExec
    }
}

struct Invocation {
    program: String,
    flag: String,
    script: String,
    command: String,
    working_dir: Option<String>,
}

impl Invocation {
    async fn run(self, tx: ResultSender) {
        let ctx = tx.context().clone();
        if let Some(err) = ctx.err() {
            tx.fail_context(err);
            return;
        }
        let task_id = tx.task_id().to_string();

        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.flag)
            .arg(&self.script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group so background jobs die with the shell
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Task {}: failed to spawn '{}': {}", task_id, self.command, e);
                tx.finish(OutputResult::failed(
                    task_id,
                    "failed to start command",
                    e.to_string(),
                ));
                return;
            }
        };

        let (line_tx, mut line_rx) = mpsc::channel::<String>(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let mut final_dir = None;
        loop {
            tokio::select! {
                biased;
                err = ctx.wait_err() => {
                    kill(&mut child, &task_id).await;
                    tx.fail_context(err);
                    return;
                }
                line = line_rx.recv() => {
                    let Some(line) = line else { break };
                    let (chunk, dir) = split_marker(&line);
                    if dir.is_some() {
                        final_dir = dir;
                    }
                    let Some(chunk) = chunk else { continue };
                    if let Err(err) = tx.progress("", chunk).await {
                        kill(&mut child, &task_id).await;
                        tx.fail_context(err);
                        return;
                    }
                }
            }
        }

        let status = tokio::select! {
            biased;
            err = ctx.wait_err() => {
                kill(&mut child, &task_id).await;
                tx.fail_context(err);
                return;
            }
            status = child.wait() => status,
        };

        let dir = final_dir
            .or(self.working_dir)
            .or_else(|| {
                std::env::current_dir()
                    .ok()
                    .map(|d| d.display().to_string())
            })
            .unwrap_or_default();

        let result = match status {
            Ok(status) if status.success() => OutputResult::succeeded(
                task_id.clone(),
                format!("command exited with code 0 (cwd: {})", dir),
            ),
            Ok(status) => {
                let code = status.code().unwrap_or(-1);
                OutputResult::failed(
                    task_id.clone(),
                    format!("command exited with code {} (cwd: {})", code, dir),
                    format!("exit status {}", code),
                )
            }
            Err(e) => OutputResult::failed(
                task_id.clone(),
                "failed to wait for command",
                e.to_string(),
            ),
        };
        debug!("Task {} command finished: {}", task_id, result.message);
        tx.finish(result);
    }
}

/// Forward raw lines (newline included) from one pipe
async fn pump_lines<R>(reader: R, lines: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if lines.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Pipe read failed: {}", e);
                break;
            }
        }
    }
}

/// Split command output from the trailing directory marker
fn split_marker(line: &str) -> (Option<String>, Option<String>) {
    match line.rfind(CWD_MARKER) {
        Some(idx) => {
            let output = &line[..idx];
            let dir = line[idx + CWD_MARKER.len()..]
                .trim_end_matches(['\n', '\r'])
                .to_string();
            let output = (!output.is_empty()).then(|| output.to_string());
            (output, Some(dir))
        }
        None => (Some(line.to_string()), None),
    }
}

async fn kill(child: &mut Child, task_id: &str) {
    kill_group(child, task_id);
    match child.kill().await {
        Ok(()) => info!("Killed process for task {}", task_id),
        Err(e) => warn!("Failed to kill process for task {}: {}", task_id, e),
    }
}

/// SIGKILL every process in the shell's group
#[cfg(unix)]
fn kill_group(child: &Child, task_id: &str) {
    let Some(pid) = child.id() else { return };
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "Process group of task {} not signalled: {}",
            task_id,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child, _task_id: &str) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::combine;
    use crate::params::FileReadParams;
    use crate::state::TaskStatus;
    use crate::task::Task;

    fn shell_task(id: &str, command: &str) -> TaskRef {
        TaskRef::new(Task::new(
            id,
            command,
            ShellParams {
                command: command.into(),
                ..Default::default()
            },
        ))
    }

    #[test]
    fn test_split_marker() {
        assert_eq!(split_marker("hello\n"), (Some("hello\n".to_string()), None));
        assert_eq!(
            split_marker("__WEAVE_CWD__:/tmp\n"),
            (None, Some("/tmp".to_string()))
        );
        assert_eq!(
            split_marker("partial__WEAVE_CWD__:/srv\n"),
            (Some("partial".to_string()), Some("/srv".to_string()))
        );
    }

    #[tokio::test]
    async fn test_structural_errors() {
        let executor = ShellExecutor::new();
        let ctx = ExecutionContext::new();

        let empty = shell_task("t1", "   ");
        let err = executor.execute(&ctx, empty).await.unwrap_err();
        assert!(matches!(err, Error::MissingParameter { parameter: "command", .. }));

        let wrong = TaskRef::new(Task::new("t2", "read", FileReadParams::default()));
        let err = executor.execute(&ctx, wrong).await.unwrap_err();
        assert!(matches!(err, Error::WrongExecutor { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streams_output_and_reports_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ShellExecutor::new();
        let ctx = ExecutionContext::new();
        let task = shell_task(
            "t1",
            &format!("echo one; echo two >&2; cd {}", dir.path().display()),
        );

        let stream = executor.execute(&ctx, task.clone()).await.unwrap();
        let result = combine(&ctx, stream).await;

        assert_eq!(result.status, TaskStatus::Succeeded);
        assert!(result.result_data.contains("one\n"));
        assert!(result.result_data.contains("two\n"));
        assert!(!result.result_data.contains(CWD_MARKER));
        let canonical = dir.path().canonicalize().unwrap();
        assert!(
            result.message.contains(&*canonical.to_string_lossy())
                || result.message.contains(&*dir.path().to_string_lossy())
        );
        assert_eq!(task.status(), TaskStatus::Succeeded);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_fails() {
        let executor = ShellExecutor::new();
        let ctx = ExecutionContext::new();
        let task = shell_task("t1", "echo nope; exit 3");

        let messages = executor
            .execute(&ctx, task.clone())
            .await
            .unwrap()
            .collect_all()
            .await;
        let last = messages.last().unwrap();
        assert_eq!(last.status, TaskStatus::Failed);
        assert_eq!(last.error, "exit status 3");
        assert_eq!(messages.iter().filter(|m| m.is_terminal()).count(), 1);
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_command() {
        let executor = ShellExecutor::new();
        let ctx = ExecutionContext::new();
        let task = TaskRef::new(Task::new(
            "t1",
            "sleep",
            ShellParams {
                command: "sleep 30".into(),
                timeout_secs: Some(1),
                ..Default::default()
            },
        ));

        let stream = executor.execute(&ctx, task).await.unwrap();
        let messages = tokio::time::timeout(Duration::from_secs(10), stream.collect_all())
            .await
            .expect("stream must close after the timeout");
        let last = messages.last().unwrap();
        assert_eq!(last.status, TaskStatus::Failed);
        assert_eq!(last.error, "context deadline exceeded");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_mid_stream() {
        let executor = ShellExecutor::new();
        let ctx = ExecutionContext::new();
        let task = shell_task("t1", "echo started; sleep 30");

        let mut stream = executor.execute(&ctx, task.clone()).await.unwrap();
        let first = stream.recv().await.unwrap();
        assert_eq!(first.status, TaskStatus::Running);
        ctx.cancel();

        let rest = tokio::time::timeout(Duration::from_secs(10), stream.collect_all())
            .await
            .expect("stream must close after cancellation");
        let last = rest.last().unwrap();
        assert_eq!(last.status, TaskStatus::Failed);
        assert_eq!(last.error, "context canceled");
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_background_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");
        let executor = ShellExecutor::new();
        let ctx = ExecutionContext::new();
        let task = shell_task(
            "t1",
            &format!("(sleep 1; touch {}) & sleep 30", marker.display()),
        );

        let stream = executor.execute(&ctx, task.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        ctx.cancel();
        let messages = tokio::time::timeout(Duration::from_secs(10), stream.collect_all())
            .await
            .expect("stream must close after cancellation");
        assert_eq!(messages.last().unwrap().error, "context canceled");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists());
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_terminal_task_not_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let executor = ShellExecutor::new();
        let ctx = ExecutionContext::new();
        let task = TaskRef::new(
            Task::new(
                "t1",
                "touch",
                ShellParams {
                    command: format!("touch {}", marker.display()),
                    ..Default::default()
                },
            )
            .with_status(TaskStatus::Succeeded),
        );

        let messages = executor.execute(&ctx, task).await.unwrap().collect_all().await;
        assert_eq!(messages.len(), 1);
        assert!(!marker.exists());
    }
}
