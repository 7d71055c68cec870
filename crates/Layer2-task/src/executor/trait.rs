//! Executor traits - the seams to the OS
//!
//! `WorkerSpawner` starts the external worker; `ProcessSignaller` delivers
//! termination signals. Both are injected into the launcher / cancel path so
//! tests can substitute scripted fakes.

use autorun_foundation::Result;
use futures::future::BoxFuture;
use tokio::io::AsyncRead;

/// Captured output stream of a worker
pub type WorkerOutput = Box<dyn AsyncRead + Send + Unpin>;

/// Resolves when the worker exits, with its exit code (`None` = killed by a signal)
pub type WorkerExit = BoxFuture<'static, std::io::Result<Option<i32>>>;

/// Program and arguments for one worker run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerInvocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Literal invocation as written to the log preamble
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// A started worker process
pub struct WorkerHandle {
    pub pid: u32,
    pub stdout: Option<WorkerOutput>,
    pub stderr: Option<WorkerOutput>,
    pub exit: WorkerExit,
}

/// Spawner trait - implement to change how workers are started
pub trait WorkerSpawner: Send + Sync {
    /// Start the worker detached from the supervisor, stdin closed,
    /// stdout/stderr captured
    fn spawn(&self, invocation: &WorkerInvocation) -> Result<WorkerHandle>;

    /// Get spawner name
    fn name(&self) -> &'static str;
}

/// Termination strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM on Unix
    Graceful,
    /// SIGKILL on Unix
    Forceful,
}

/// Signal delivery to worker processes
pub trait ProcessSignaller: Send + Sync {
    fn signal(&self, pid: u32, signal: Signal) -> Result<()>;
}
