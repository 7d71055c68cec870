//! Cancel - stop a running worker and drop its record

use crate::executor::Signal;
use crate::manager::TaskManager;
use crate::state::TaskStatus;
use crate::task::{TaskToken, TaskUpdate};
use autorun_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const CANCELLED_MESSAGE: &str = "Task cancelled successfully";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelResponse {
    pub token: TaskToken,
    pub status: TaskStatus,
    pub message: String,
}

impl TaskManager {
    /// Terminate a running task: graceful signal first, forceful only if the
    /// graceful attempt errors. The token is invalid afterwards.
    ///
    /// Finished tasks are refused with `AlreadyTerminal` and left untouched.
    pub fn cancel(&self, token: &TaskToken) -> Result<CancelResponse> {
        let record = self
            .registry()
            .get(token)
            .ok_or_else(|| Error::InvalidToken(token.to_string()))?;

        if record.status.is_terminal() {
            return Err(Error::already_terminal(token.as_str(), record.status.as_str()));
        }

        if let Err(e) = self.signaller().signal(record.pid, Signal::Graceful) {
            debug!("Task {}: graceful stop failed ({}), escalating", token, e);
            if let Err(e) = self.signaller().signal(record.pid, Signal::Forceful) {
                // Usually the worker exited between the two attempts
                debug!("Task {}: forceful stop failed: {}", token, e);
            }
        }

        match self.registry().update(token, TaskUpdate::status(TaskStatus::Cancelled)) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(Error::InvalidToken(token.to_string())),
            Err(e) => {
                // The exit watcher finalized first; leave its result for a consumer
                warn!("Task {} finished before cancel took effect: {}", token, e);
                let status = self
                    .registry()
                    .get(token)
                    .map(|r| r.status)
                    .unwrap_or(TaskStatus::Failed);
                return Err(Error::already_terminal(token.as_str(), status.as_str()));
            }
        }

        self.registry().delete(token);
        info!("Cancelled task {} (pid {})", token, record.pid);

        Ok(CancelResponse {
            token: token.clone(),
            status: TaskStatus::Cancelled,
            message: CANCELLED_MESSAGE.to_string(),
        })
    }
}
