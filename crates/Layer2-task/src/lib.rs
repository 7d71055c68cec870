//! # autorun-task
//!
//! Supervision of long-running worker processes for autorun.
//! Starts a worker per question, captures its output to a log, and lets a
//! caller wait for, resume, or cancel the result.
//!
//! ## Features
//!
//! - In-memory task registry with a push-based status channel per task
//! - Detached worker launch with stdout/stderr captured to an append-only log
//! - Summary extraction from the worker's last response
//! - **Hybrid submit: wait a bounded time, then hand back a token**
//! - **Resume-wait and cancel against the same registry**

pub mod cancel;
pub mod executor;
pub mod launcher;
pub mod log;
pub mod manager;
pub mod registry;
pub mod resume;
pub mod state;
pub mod submit;
pub mod summary;
pub mod task;
pub mod wait;

// Task system
pub use manager::{TaskManager, TaskStats};
pub use registry::TaskRegistry;
pub use state::TaskStatus;
pub use task::{validate_role, TaskRecord, TaskToken, TaskUpdate};

// Operations
pub use cancel::{CancelResponse, CANCELLED_MESSAGE};
pub use resume::{ResumeResponse, RETRY_HINT};
pub use submit::{SubmitResponse, WaitMode, USAGE_HINT};
pub use wait::{wait_for_terminal, WaitOutcome};

// Process backends
pub use executor::{
    LocalSpawner, OsSignaller, ProcessSignaller, Signal, WorkerExit, WorkerHandle,
    WorkerInvocation, WorkerOutput, WorkerSpawner,
};
pub use launcher::{ArtifactLayout, TaskLauncher};

// Log system
pub use log::{count_lines, LogPreamble, LogSink, TaskLogWriter};
pub use summary::{extract_summary, started_summary};
