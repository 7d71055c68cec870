//! # autorun-foundation
//!
//! Foundation layer for autorun:
//! - Error: shared error type and `Result` alias
//! - Config: supervisor settings (`AutorunConfig`)
//! - Storage: `JsonStore` for layered JSON config files

pub mod config;
pub mod error;
pub mod storage;

pub use config::{AutorunConfig, WorkerConfig, AGENTS_DIR_ENV, AUTORUN_CONFIG_FILE};
pub use error::{Error, Result};
pub use storage::JsonStore;
