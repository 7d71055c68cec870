//! One-shot CLI mode

use autorun_task::{wait_for_terminal, SubmitResponse, TaskManager, WaitMode};
use tracing::info;

/// Submit a single question and print the response as JSON.
///
/// Output capture lives in this process, so when a handle is returned the
/// process stays until the worker exits and its log is complete.
pub async fn run_once(
    manager: &TaskManager,
    role: &str,
    question: &str,
    mode: WaitMode,
) -> anyhow::Result<()> {
    let response = manager.submit(role, question, mode).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if let SubmitResponse::Started { token, .. } = &response {
        info!("Waiting for task {} to finish writing its log", token);
        let outcome = wait_for_terminal(manager.registry(), token, None).await;
        info!("Task {} ended: {:?}", token, outcome);
    }

    Ok(())
}
