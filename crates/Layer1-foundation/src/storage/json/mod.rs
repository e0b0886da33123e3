mod store;

pub use store::{JsonStore, STORE_DIR};
