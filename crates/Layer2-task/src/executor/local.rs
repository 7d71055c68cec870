//! Local spawner - runs the worker as a detached host process
//!
//! Features:
//! - Own process group, so terminal signals aimed at the supervisor skip it
//! - No kill-on-drop: the worker outlives the supervisor
//! - stdin closed, stdout/stderr piped for log capture
//! - Exit observed through an async future, never a blocking wait

use crate::executor::{WorkerHandle, WorkerInvocation, WorkerOutput, WorkerSpawner};
use autorun_foundation::{Error, Result};
use futures::FutureExt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// `CREATE_NEW_PROCESS_GROUP`
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Spawner that starts workers on the host system
#[derive(Debug, Clone, Default)]
pub struct LocalSpawner;

impl LocalSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl WorkerSpawner for LocalSpawner {
    fn spawn(&self, invocation: &WorkerInvocation) -> Result<WorkerHandle> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Launch(format!("{}: {}", invocation.program, e)))?;

        let pid = child
            .id()
            .ok_or_else(|| Error::Launch(format!("{} exited before start", invocation.program)))?;

        let stdout = child.stdout.take().map(|s| Box::new(s) as WorkerOutput);
        let stderr = child.stderr.take().map(|s| Box::new(s) as WorkerOutput);

        debug!("Spawned worker {} (pid {})", invocation.program, pid);

        let exit = async move { child.wait().await.map(|status| status.code()) }.boxed();

        Ok(WorkerHandle {
            pid,
            stdout,
            stderr,
            exit,
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
