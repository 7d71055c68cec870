//! Task definition and types

use crate::state::TaskStatus;
use autorun_foundation::{Error, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Random bytes per token (rendered as lowercase hex, so 6 characters)
const TOKEN_BYTES: usize = 3;

/// Short opaque identifier for a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskToken(String);

impl TaskToken {
    /// Generate a new random token from the thread-local CSPRNG
    pub fn generate() -> Self {
        let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().gen();
        Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reject role names that would escape `<agentsDir>/<role>/`
pub fn validate_role(role: &str) -> Result<()> {
    if role.trim().is_empty() {
        return Err(Error::InvalidInput("role must not be empty".to_string()));
    }
    if role == "." || role == ".." || role.contains(['/', '\\']) || role.contains('\0') {
        return Err(Error::InvalidInput(format!("invalid role name: {}", role)));
    }
    Ok(())
}

/// In-memory state for one worker invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub token: TaskToken,

    /// Worker configuration name
    pub role: String,

    /// OS process id of the worker
    pub pid: u32,

    pub log_path: PathBuf,

    pub summary_path: PathBuf,

    pub status: TaskStatus,

    pub created_at: DateTime<Utc>,

    /// Set together with the terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Worker exit code, when the task finished on its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl TaskRecord {
    pub fn new(
        token: TaskToken,
        role: impl Into<String>,
        pid: u32,
        log_path: impl Into<PathBuf>,
        summary_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            token,
            role: role.into(),
            pid,
            log_path: log_path.into(),
            summary_path: summary_path.into(),
            status: TaskStatus::Running,
            created_at: Utc::now(),
            finished_at: None,
            exit_code: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Time since creation, or until finish
    pub fn duration(&self) -> std::time::Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.created_at).to_std().unwrap_or_default()
    }
}

/// Partial update merged into an existing record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub exit_code: Option<i32>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Status and exit code from a finished worker
    pub fn exited(code: Option<i32>) -> Self {
        Self {
            status: Some(TaskStatus::from_exit_code(code)),
            exit_code: code,
        }
    }
}
