//! Resume-wait - re-attach to a task started earlier

use crate::log::{read_line_count, read_summary};
use crate::manager::TaskManager;
use crate::state::TaskStatus;
use crate::task::{TaskRecord, TaskToken};
use crate::wait::{wait_for_terminal, WaitOutcome};
use autorun_foundation::{Error, Result};
use serde::{Deserialize, Serialize};

/// Returned when the resume budget elapses
pub const RETRY_HINT: &str = "Task still running. Call await again to continue waiting.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeResponse {
    pub status: TaskStatus,
    pub line_count: usize,
    pub timeout: bool,

    /// Summary file content; `null` until it has been written
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskManager {
    /// Wait (bounded) for a task's result. Never removes the record, so it
    /// can be called any number of times.
    pub async fn resume(&self, token: &TaskToken) -> Result<ResumeResponse> {
        let record = self
            .registry()
            .get(token)
            .ok_or_else(|| Error::InvalidToken(token.to_string()))?;

        if record.status.is_terminal() {
            return Ok(report(&record, record.status, false).await);
        }

        match wait_for_terminal(self.registry(), token, Some(self.config().resume_wait())).await {
            WaitOutcome::Finished(status) => Ok(report(&record, status, false).await),
            WaitOutcome::TimedOut => {
                let mut response = report(&record, TaskStatus::Running, true).await;
                response.message = Some(RETRY_HINT.to_string());
                Ok(response)
            }
            WaitOutcome::Gone => Err(Error::InvalidToken(token.to_string())),
        }
    }
}

async fn report(record: &TaskRecord, status: TaskStatus, timeout: bool) -> ResumeResponse {
    ResumeResponse {
        status,
        line_count: read_line_count(&record.log_path).await,
        timeout,
        summary: read_summary(&record.summary_path).await,
        message: None,
    }
}
