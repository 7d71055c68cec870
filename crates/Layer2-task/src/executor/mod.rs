//! Task executors
//!
//! - `WorkerSpawner` / `LocalSpawner` - detached worker processes with piped output
//! - `ProcessSignaller` / `OsSignaller` - SIGTERM / SIGKILL delivery

pub mod local;
pub mod signal;
pub mod r#trait;

pub use local::LocalSpawner;
pub use r#trait::{
    ProcessSignaller, Signal, WorkerExit, WorkerHandle, WorkerInvocation, WorkerOutput,
    WorkerSpawner,
};
pub use signal::OsSignaller;
