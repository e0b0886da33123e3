//! Config - engine settings
//!
//! - `engine.rs` - EngineConfig (stream buffering, chunking, shell)

mod engine;

pub use engine::{
    EngineConfig, EngineOverrides, ShellSettings, DEFAULT_READ_CHUNK_SIZE, DEFAULT_STREAM_BUFFER,
    ENGINE_CONFIG_FILE,
};
