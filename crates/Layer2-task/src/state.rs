//! Task status state machine
//!
//! ```text
//! Running ──┬──> Completed
//!           ├──> Failed
//!           └──> Cancelled
//! ```

use serde::{Deserialize, Serialize};

/// Possible states of a task. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Worker process is alive (or its exit has not been observed yet)
    Running,

    /// Worker exited with code 0
    Completed,

    /// Worker exited with a non-zero code or was killed by a signal
    Failed,

    /// Task was cancelled through `halt`
    Cancelled,
}

impl TaskStatus {
    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TaskStatus::Running)
    }

    /// Status derived from a worker exit code. `None` means the process
    /// died without a code (signal) and counts as a failure.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => TaskStatus::Completed,
            _ => TaskStatus::Failed,
        }
    }

    /// Whether `self -> next` is allowed. Re-applying the current terminal
    /// status is accepted as a no-op by the registry, not here.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        self.is_running() && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
