//! # weave-task
//!
//! Task execution engine for taskweave.
//! Runs task trees through a registry of executors, one per task type.
//!
//! ## Features
//!
//! - Task tree model with a monotonic status state machine
//! - Streamed results: progress messages, then exactly one terminal result
//! - Cancellation and deadlines through [`ExecutionContext`]
//! - Already-finished tasks replay their stored output instead of re-running
//! - Sequential, fail-fast group execution with unbounded nesting
//! - Leaf executors for shell, file read/write, patching, listing and prompts

pub mod combinator;
pub mod context;
pub mod diff;
pub mod executor;
pub mod params;
pub mod registry;
pub mod state;
pub mod stream;
pub mod task;

// Model
pub use params::{
    FileReadParams, FileWriteParams, ListDirectoryParams, PatchParams, ShellParams,
    TaskParameters, TaskType, UserInputParams,
};
pub use state::TaskStatus;
pub use task::{OutputResult, Task, TaskRef, TaskSummary};

// Execution
pub use combinator::combine;
pub use context::{ContextError, ExecutionContext};
pub use executor::{
    replay_if_terminal, Executor, FileReadExecutor, FileWriteExecutor, GroupExecutor,
    ListDirectoryExecutor, PatchFileExecutor, RequestUserInputExecutor, ShellExecutor,
};
pub use registry::Registry;
pub use stream::{ResultSender, ResultStream};

pub use diff::{Patch, PatchError};
