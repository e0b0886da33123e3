//! Engine Config - execution engine settings
//!
//! Loaded from the global store, then overridden by the project store.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Config file name
pub const ENGINE_CONFIG_FILE: &str = "engine.json";

/// Default capacity of a task's non-terminal message buffer
pub const DEFAULT_STREAM_BUFFER: usize = 10;

/// Default size of a single file-read chunk in bytes
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

fn default_stream_buffer() -> usize {
    DEFAULT_STREAM_BUFFER
}

fn default_read_chunk_size() -> usize {
    DEFAULT_READ_CHUNK_SIZE
}

// ============================================================================
// Engine Config
// ============================================================================

/// Execution engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Bounded capacity of each stream's progress channel
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Bytes per chunk when streaming file content
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Shell execution settings
    #[serde(default)]
    pub shell: ShellSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream_buffer: DEFAULT_STREAM_BUFFER,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            shell: ShellSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Load global, then project overrides
    pub fn load() -> Result<Self> {
        let mut stores: Vec<JsonStore> = JsonStore::global().into_iter().collect();
        if let Ok(project) = JsonStore::current_project() {
            stores.push(project);
        }
        Self::load_layered(&stores)
    }

    /// Apply each store's overrides in order; later stores win
    pub fn load_layered(stores: &[JsonStore]) -> Result<Self> {
        let mut config = Self::new();
        for store in stores {
            if let Some(overrides) = store.read::<EngineOverrides>(ENGINE_CONFIG_FILE)? {
                debug!("Loaded engine config from {}", store.base_dir().display());
                config.merge(overrides);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay every field `overrides` sets
    pub fn merge(&mut self, overrides: EngineOverrides) {
        if let Some(capacity) = overrides.stream_buffer {
            self.stream_buffer = capacity;
        }
        if let Some(size) = overrides.read_chunk_size {
            self.read_chunk_size = size;
        }
        if let Some(shell) = overrides.shell {
            self.shell.merge(shell);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream_buffer == 0 {
            return Err(Error::Config("streamBuffer must be at least 1".to_string()));
        }
        if self.read_chunk_size == 0 {
            return Err(Error::Config("readChunkSize must be at least 1".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity;
        self
    }

    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    pub fn shell_timeout_secs(mut self, secs: u64) -> Self {
        self.shell.default_timeout_secs = Some(secs);
        self
    }
}

/// One config document; absent fields leave the current value alone
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOverrides {
    pub stream_buffer: Option<usize>,
    pub read_chunk_size: Option<usize>,
    pub shell: Option<ShellSettings>,
}

// ============================================================================
// Shell
// ============================================================================

/// Shell used for `shell-exec` tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellSettings {
    /// Shell program (default: `sh`, `cmd` on Windows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    /// Flag preceding the command string (default: `-c`, `/C` on Windows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,

    /// Wall-clock cap applied beneath the caller's context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_timeout_secs: Option<u64>,
}

impl ShellSettings {
    pub fn program(&self) -> &str {
        match &self.program {
            Some(p) => p,
            None if cfg!(windows) => "cmd",
            None => "sh",
        }
    }

    pub fn flag(&self) -> &str {
        match &self.flag {
            Some(f) => f,
            None if cfg!(windows) => "/C",
            None => "-c",
        }
    }

    fn merge(&mut self, other: ShellSettings) {
        if other.program.is_some() {
            self.program = other.program;
        }
        if other.flag.is_some() {
            self.flag = other.flag;
        }
        if other.default_timeout_secs.is_some() {
            self.default_timeout_secs = other.default_timeout_secs;
        }
    }
}
