//! H-Bank core types and utilities

pub mod error;
pub mod state_dir;
pub mod storage;

pub use error::{CoreError, CoreResult};
pub use state_dir::StateDir;
pub use storage::{FileStore, KeyValueStore, MemoryStore, write_atomic};
