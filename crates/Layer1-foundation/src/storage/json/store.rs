//! JSON documents under a scope directory

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Directory name shared by the global and project scopes
pub const STORE_DIR: &str = "taskweave";

/// Read-only view of one scope directory
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `~/.config/taskweave/`, if the platform has a config directory
    pub fn global() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join(STORE_DIR)))
    }

    /// `<root>/.taskweave/`
    pub fn project(root: &Path) -> Self {
        Self::new(root.join(format!(".{}", STORE_DIR)))
    }

    pub fn current_project() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Storage(format!("Cannot get current directory: {}", e)))?;
        Ok(Self::project(&cwd))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Parse `name`, or `None` when the scope has no such file
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.base_dir.join(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage(format!("Cannot read {}: {}", path.display(), e)))
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Storage(format!("Invalid JSON in {}: {}", path.display(), e)))
    }
}
