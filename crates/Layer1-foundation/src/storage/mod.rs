//! Storage module
//!
//! - `json`: JSON documents under a base directory (config, saved plans)

mod json;

pub use json::{JsonStore, STORE_DIR};
