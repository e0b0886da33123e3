//! Task executors
//!
//! One executor per [`TaskType`](crate::TaskType):
//! - `ShellExecutor` - runs a command, streaming merged stdout/stderr
//! - `FileReadExecutor` - streams file content in chunks
//! - `FileWriteExecutor` - create-or-truncate write
//! - `PatchFileExecutor` - applies a unified diff
//! - `ListDirectoryExecutor` - formats a directory listing
//! - `RequestUserInputExecutor` - hands a prompt back to the caller
//! - `GroupExecutor` - runs children in order, stopping at the first failure
//!
//! Every executor starts with [`replay_if_terminal`].

pub mod file_read;
pub mod file_write;
pub mod group;
pub mod list_dir;
pub mod patch;
pub mod shell;
pub mod r#trait;
pub mod user_input;

pub use file_read::FileReadExecutor;
pub use file_write::FileWriteExecutor;
pub use group::GroupExecutor;
pub use list_dir::ListDirectoryExecutor;
pub use patch::PatchFileExecutor;
pub use r#trait::Executor;
pub use shell::ShellExecutor;
pub use user_input::RequestUserInputExecutor;

use crate::stream::ResultStream;
use crate::task::TaskRef;
use tracing::debug;

/// Terminal-task short-circuit.
///
/// A task that already succeeded or failed is not run again: the returned
/// stream holds only its stored output.
pub fn replay_if_terminal(task: &TaskRef) -> Option<ResultStream> {
    let task = task.read();
    if !task.status().is_terminal() {
        return None;
    }
    debug!(
        "Task {} already {}, replaying stored output",
        task.task_id,
        task.status()
    );
    Some(ResultStream::from_result(task.stored_output()))
}
