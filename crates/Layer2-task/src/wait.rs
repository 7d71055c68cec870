//! Waiting for a task to leave `running`
//!
//! A wait is a race between the task's status channel and an optional
//! deadline; whichever resolves first wins and the other is dropped.

use crate::registry::TaskRegistry;
use crate::state::TaskStatus;
use crate::task::TaskToken;
use std::time::Duration;
use tokio::sync::watch;

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Task reached this terminal status
    Finished(TaskStatus),
    /// Deadline passed while the task was still running
    TimedOut,
    /// Record was removed (or never existed) before a terminal status was seen
    Gone,
}

/// Wait until `token` is terminal, or until `deadline` elapses.
/// `None` waits without bound.
pub async fn wait_for_terminal(
    registry: &TaskRegistry,
    token: &TaskToken,
    deadline: Option<Duration>,
) -> WaitOutcome {
    match registry.subscribe(token) {
        Some(rx) => wait_on(rx, deadline).await,
        None => WaitOutcome::Gone,
    }
}

async fn wait_on(mut rx: watch::Receiver<TaskStatus>, deadline: Option<Duration>) -> WaitOutcome {
    let terminal = async {
        // The current value is checked before waiting, so a transition that
        // happened before subscribing is not missed.
        match rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => WaitOutcome::Finished(*status),
            Err(_) => WaitOutcome::Gone,
        }
    };

    match deadline {
        Some(deadline) => tokio::select! {
            outcome = terminal => outcome,
            _ = tokio::time::sleep(deadline) => WaitOutcome::TimedOut,
        },
        None => terminal.await,
    }
}
