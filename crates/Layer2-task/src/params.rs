//! Task types and their parameter payloads
//!
//! The payload shape is decided by the task type, so decoding is
//! type-directed: read `type` first, then decode `parameters` into the
//! matching struct with [`TaskParameters::from_value`].

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    ShellExec,
    FileRead,
    FileWrite,
    PatchFile,
    ListDirectory,
    RequestUserInput,
    Group,
}

impl TaskType {
    /// Every task type, leaves first
    pub const ALL: [TaskType; 7] = [
        TaskType::ShellExec,
        TaskType::FileRead,
        TaskType::FileWrite,
        TaskType::PatchFile,
        TaskType::ListDirectory,
        TaskType::RequestUserInput,
        TaskType::Group,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::ShellExec => "shell-exec",
            TaskType::FileRead => "file-read",
            TaskType::FileWrite => "file-write",
            TaskType::PatchFile => "patch-file",
            TaskType::ListDirectory => "list-directory",
            TaskType::RequestUserInput => "request-user-input",
            TaskType::Group => "group",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// `shell-exec` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShellParams {
    /// Command line handed to the shell
    pub command: String,

    /// Directory to start in (default: the process's current directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Wall-clock cap for this command only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// `file-read` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileReadParams {
    pub path: String,

    /// First line to include (1-based, inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,

    /// Last line to include (1-based, inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
}

/// `file-write` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileWriteParams {
    pub path: String,
    pub content: String,
}

/// `patch-file` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatchParams {
    pub path: String,

    /// Unified diff text
    pub patch: String,
}

/// `list-directory` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListDirectoryParams {
    pub path: String,
}

/// `request-user-input` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserInputParams {
    pub prompt: String,
}

// ============================================================================
// Tagged union
// ============================================================================

/// Parameter payload, one variant per [`TaskType`]
#[derive(Debug, Clone, PartialEq)]
pub enum TaskParameters {
    ShellExec(ShellParams),
    FileRead(FileReadParams),
    FileWrite(FileWriteParams),
    PatchFile(PatchParams),
    ListDirectory(ListDirectoryParams),
    RequestUserInput(UserInputParams),
    /// Groups carry no payload; their work is their children
    Group,
}

impl TaskParameters {
    /// The task type this payload belongs to
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskParameters::ShellExec(_) => TaskType::ShellExec,
            TaskParameters::FileRead(_) => TaskType::FileRead,
            TaskParameters::FileWrite(_) => TaskType::FileWrite,
            TaskParameters::PatchFile(_) => TaskType::PatchFile,
            TaskParameters::ListDirectory(_) => TaskType::ListDirectory,
            TaskParameters::RequestUserInput(_) => TaskType::RequestUserInput,
            TaskParameters::Group => TaskType::Group,
        }
    }

    /// Decode a raw payload into the shape `task_type` requires.
    ///
    /// A missing (`null`) payload decodes to the type's empty parameters so
    /// that absent required fields are reported by the executor.
    pub fn from_value(task_type: TaskType, value: Value) -> serde_json::Result<Self> {
        let value = if value.is_null() {
            Value::Object(Default::default())
        } else {
            value
        };

        Ok(match task_type {
            TaskType::ShellExec => TaskParameters::ShellExec(serde_json::from_value(value)?),
            TaskType::FileRead => TaskParameters::FileRead(serde_json::from_value(value)?),
            TaskType::FileWrite => TaskParameters::FileWrite(serde_json::from_value(value)?),
            TaskType::PatchFile => TaskParameters::PatchFile(serde_json::from_value(value)?),
            TaskType::ListDirectory => {
                TaskParameters::ListDirectory(serde_json::from_value(value)?)
            }
            TaskType::RequestUserInput => {
                TaskParameters::RequestUserInput(serde_json::from_value(value)?)
            }
            TaskType::Group => TaskParameters::Group,
        })
    }
}

impl Serialize for TaskParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TaskParameters::ShellExec(p) => p.serialize(serializer),
            TaskParameters::FileRead(p) => p.serialize(serializer),
            TaskParameters::FileWrite(p) => p.serialize(serializer),
            TaskParameters::PatchFile(p) => p.serialize(serializer),
            TaskParameters::ListDirectory(p) => p.serialize(serializer),
            TaskParameters::RequestUserInput(p) => p.serialize(serializer),
            TaskParameters::Group => {
                serde_json::Map::<String, Value>::new().serialize(serializer)
            }
        }
    }
}

impl From<ShellParams> for TaskParameters {
    fn from(p: ShellParams) -> Self {
        TaskParameters::ShellExec(p)
    }
}

impl From<FileReadParams> for TaskParameters {
    fn from(p: FileReadParams) -> Self {
        TaskParameters::FileRead(p)
    }
}

impl From<FileWriteParams> for TaskParameters {
    fn from(p: FileWriteParams) -> Self {
        TaskParameters::FileWrite(p)
    }
}

impl From<PatchParams> for TaskParameters {
    fn from(p: PatchParams) -> Self {
        TaskParameters::PatchFile(p)
    }
}

impl From<ListDirectoryParams> for TaskParameters {
    fn from(p: ListDirectoryParams) -> Self {
        TaskParameters::ListDirectory(p)
    }
}

impl From<UserInputParams> for TaskParameters {
    fn from(p: UserInputParams) -> Self {
        TaskParameters::RequestUserInput(p)
    }
}
