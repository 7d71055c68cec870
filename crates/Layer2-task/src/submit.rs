//! Submit - start a task and wait according to the requested mode

use crate::manager::TaskManager;
use crate::state::TaskStatus;
use crate::summary::started_summary;
use crate::task::{TaskRecord, TaskToken};
use crate::wait::{wait_for_terminal, WaitOutcome};
use autorun_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Hint returned with every async handle
pub const USAGE_HINT: &str = "Use await(token) to get the response, halt(token) to cancel";

/// How long `submit` waits for the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    /// Return the token right away
    Immediate,
    /// Wait until the task finishes
    Blocking,
    /// Wait up to the hybrid budget, then fall back to a token
    #[default]
    Hybrid,
}

impl std::str::FromStr for WaitMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "immediate" => Ok(Self::Immediate),
            "blocking" => Ok(Self::Blocking),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::InvalidInput(format!("unknown wait mode: {}", other))),
        }
    }
}

/// Result of `submit`. A token is present only while the task is still running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmitResponse {
    Started {
        token: TaskToken,
        status: TaskStatus,
        summary: String,
        usage: String,
    },
    Finished {
        status: TaskStatus,
        #[serde(rename = "logPath")]
        log_path: PathBuf,
    },
}

impl SubmitResponse {
    pub fn token(&self) -> Option<&TaskToken> {
        match self {
            Self::Started { token, .. } => Some(token),
            Self::Finished { .. } => None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Started { status, .. } | Self::Finished { status, .. } => *status,
        }
    }
}

impl TaskManager {
    /// Launch a worker for `question` under `role`
    pub async fn submit(&self, role: &str, question: &str, mode: WaitMode) -> Result<SubmitResponse> {
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }

        let token = self.unused_token();
        let record = self.launcher().start(&token, role, question).await?;

        let deadline = match mode {
            WaitMode::Immediate => return Ok(self.started(&record, question)),
            WaitMode::Blocking => self.config().blocking_wait_ceiling(),
            WaitMode::Hybrid => Some(self.config().hybrid_wait()),
        };

        match wait_for_terminal(self.registry(), &token, deadline).await {
            WaitOutcome::Finished(status) => {
                self.registry().delete(&token);
                info!("Task {} consumed by submit: {}", token, status);
                Ok(SubmitResponse::Finished {
                    status,
                    log_path: record.log_path,
                })
            }
            WaitOutcome::TimedOut => {
                debug!("Task {} outlived the {:?} wait, returning handle", token, mode);
                Ok(self.started(&record, question))
            }
            // Only a cancel removes a running record
            WaitOutcome::Gone => Ok(SubmitResponse::Finished {
                status: TaskStatus::Cancelled,
                log_path: record.log_path,
            }),
        }
    }

    /// Fresh token that is not live in the registry
    fn unused_token(&self) -> TaskToken {
        loop {
            let token = TaskToken::generate();
            if !self.registry().contains(&token) {
                return token;
            }
            debug!("Token {} already live, regenerating", token);
        }
    }

    fn started(&self, record: &TaskRecord, question: &str) -> SubmitResponse {
        SubmitResponse::Started {
            token: record.token.clone(),
            status: TaskStatus::Running,
            summary: started_summary(question, self.config().question_preview_chars),
            usage: USAGE_HINT.to_string(),
        }
    }
}
