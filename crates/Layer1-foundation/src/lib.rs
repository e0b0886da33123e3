//! # weave-foundation
//!
//! Foundation layer for taskweave:
//! - Error: the workspace-wide `Error` / `Result`
//! - Storage: `JsonStore`, read-only JSON documents per scope (global, project)
//! - Config: `EngineConfig`, merged from global and project stores

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    EngineConfig, EngineOverrides, ShellSettings, DEFAULT_READ_CHUNK_SIZE, DEFAULT_STREAM_BUFFER,
    ENGINE_CONFIG_FILE,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{JsonStore, STORE_DIR};
