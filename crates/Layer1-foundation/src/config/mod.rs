//! Config - supervisor settings
//!
//! - `autorun.rs` - AutorunConfig / WorkerConfig

mod autorun;

pub use autorun::{AutorunConfig, WorkerConfig, AGENTS_DIR_ENV, AUTORUN_CONFIG_FILE};
