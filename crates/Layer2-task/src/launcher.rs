//! Task Launcher - turns `(token, role, question)` into a running worker
//!
//! Flow:
//! 1. Resolve artifact paths, create the history directory
//! 2. Load the role's system prompt if there is one
//! 3. Open the log and write the request preamble
//! 4. Spawn the worker and register the task as `running`
//! 5. In the background: copy stdout/stderr into the log, wait for exit,
//!    finalize status, write the summary, optionally delete the log

use crate::executor::{WorkerHandle, WorkerInvocation, WorkerSpawner};
use crate::log::{capture_stream, LogPreamble, TaskLogWriter};
use crate::registry::TaskRegistry;
use crate::summary::extract_summary;
use crate::task::{validate_role, TaskRecord, TaskToken, TaskUpdate};
use autorun_foundation::{Error, Result, WorkerConfig};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Separator between an injected system prompt and the question
pub const SYSTEM_PROMPT_SEPARATOR: &str = "\n---\n";

/// How long to keep reading output after the worker exits. A detached
/// grandchild can hold the pipes open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Artifact layout
// ============================================================================

/// On-disk layout under the agents directory:
///
/// ```text
/// <agentsDir>/<role>/system-prompt.md
/// <agentsDir>/<role>/data/history/<token>.log
/// <agentsDir>/<role>/data/history/<token>.summary.md
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    agents_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(agents_dir: impl Into<PathBuf>) -> Self {
        Self {
            agents_dir: agents_dir.into(),
        }
    }

    pub fn agents_dir(&self) -> &Path {
        &self.agents_dir
    }

    pub fn role_dir(&self, role: &str) -> PathBuf {
        self.agents_dir.join(role)
    }

    pub fn history_dir(&self, role: &str) -> PathBuf {
        self.role_dir(role).join("data").join("history")
    }

    pub fn log_path(&self, role: &str, token: &TaskToken) -> PathBuf {
        self.history_dir(role).join(format!("{}.log", token))
    }

    pub fn summary_path(&self, role: &str, token: &TaskToken) -> PathBuf {
        self.history_dir(role).join(format!("{}.summary.md", token))
    }

    pub fn system_prompt_path(&self, role: &str) -> PathBuf {
        self.role_dir(role).join("system-prompt.md")
    }
}

// ============================================================================
// Launcher
// ============================================================================

/// Starts workers and owns their log/summary files
pub struct TaskLauncher {
    registry: Arc<TaskRegistry>,
    spawner: Arc<dyn WorkerSpawner>,
    layout: ArtifactLayout,
    worker: WorkerConfig,
    cleanup_log: bool,
}

impl TaskLauncher {
    pub fn new(
        registry: Arc<TaskRegistry>,
        spawner: Arc<dyn WorkerSpawner>,
        layout: ArtifactLayout,
        worker: WorkerConfig,
    ) -> Self {
        Self {
            registry,
            spawner,
            layout,
            worker,
            cleanup_log: false,
        }
    }

    /// Delete each log after its summary has been written
    pub fn with_cleanup_log(mut self, cleanup: bool) -> Self {
        self.cleanup_log = cleanup;
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Start a worker for `question` and register it under `token`.
    ///
    /// The record exists (as `running`) when this returns. Exit handling,
    /// summary generation and log cleanup continue in the background.
    pub async fn start(&self, token: &TaskToken, role: &str, question: &str) -> Result<TaskRecord> {
        validate_role(role)?;
        if self.registry.contains(token) {
            return Err(Error::DuplicateToken(token.to_string()));
        }

        let log_path = self.layout.log_path(role, token);
        let summary_path = self.layout.summary_path(role, token);
        if let Some(parent) = log_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // A reused token must not expose the previous task's summary
        match tokio::fs::remove_file(&summary_path).await {
            Ok(()) => debug!("Removed stale summary {}", summary_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let system_prompt = self.load_system_prompt(role).await;
        let input = match &system_prompt {
            Some((_, prompt)) => format!("{}{}{}", prompt, SYSTEM_PROMPT_SEPARATOR, question),
            None => question.to_string(),
        };

        let mut args = self.worker.args.clone();
        args.push(input);
        let invocation = WorkerInvocation::new(self.worker.program.clone(), args);

        let writer = TaskLogWriter::open(&log_path).await?;
        let preamble = LogPreamble {
            role: role.to_string(),
            token: token.to_string(),
            started_at: Utc::now(),
            system_prompt: system_prompt
                .as_ref()
                .map(|(path, prompt)| (path.clone(), prompt.len())),
            command_line: invocation.command_line(),
        };
        writer.sink().append(preamble.render());

        // No await between this check, the spawn and the registration
        if self.registry.contains(token) {
            let _ = writer.finish().await;
            return Err(Error::DuplicateToken(token.to_string()));
        }

        let handle = match self.spawner.spawn(&invocation) {
            Ok(handle) => handle,
            Err(e) => {
                writer.sink().append(format!("[ERROR] {}\n", e));
                if let Err(log_err) = writer.finish().await {
                    debug!("Failed to close log {}: {}", log_path.display(), log_err);
                }
                warn!("Task {} ({}) failed to launch: {}", token, role, e);
                return Err(e);
            }
        };

        let record = self
            .registry
            .create(token.clone(), role, handle.pid, &log_path, &summary_path)?;

        info!(
            "Started task {} (role {}, pid {}, via {})",
            token,
            role,
            handle.pid,
            self.spawner.name()
        );

        let supervisor = ExitSupervisor {
            registry: Arc::clone(&self.registry),
            token: token.clone(),
            log_path,
            summary_path,
            cleanup_log: self.cleanup_log,
        };
        tokio::spawn(supervisor.run(handle, writer));

        Ok(record)
    }

    /// Role system prompt, if present and readable. Never fails the launch.
    async fn load_system_prompt(&self, role: &str) -> Option<(PathBuf, String)> {
        let path = self.layout.system_prompt_path(role);
        match tokio::fs::read_to_string(&path).await {
            Ok(prompt) if !prompt.is_empty() => Some((path, prompt)),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!("Ignoring unreadable system prompt {}: {}", path.display(), e);
                None
            }
        }
    }
}

// ============================================================================
// Exit handling
// ============================================================================

/// Background half of a launch: output capture through finalization
struct ExitSupervisor {
    registry: Arc<TaskRegistry>,
    token: TaskToken,
    log_path: PathBuf,
    summary_path: PathBuf,
    cleanup_log: bool,
}

impl ExitSupervisor {
    async fn run(self, handle: WorkerHandle, writer: TaskLogWriter) {
        let WorkerHandle {
            stdout,
            stderr,
            exit,
            ..
        } = handle;

        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = stdout {
            readers.push(tokio::spawn(capture_stream(stdout, writer.sink(), "stdout")));
        }
        if let Some(stderr) = stderr {
            readers.push(tokio::spawn(capture_stream(stderr, writer.sink(), "stderr")));
        }

        let exit_code = match exit.await {
            Ok(code) => code,
            Err(e) => {
                warn!("Task {}: waiting for worker failed: {}", self.token, e);
                None
            }
        };

        let drained = tokio::time::timeout(
            OUTPUT_DRAIN_GRACE,
            futures::future::join_all(readers.iter_mut()),
        )
        .await;
        if drained.is_err() {
            warn!(
                "Task {}: output still open {:?} after exit, detaching readers",
                self.token, OUTPUT_DRAIN_GRACE
            );
            for reader in &readers {
                reader.abort();
            }
        }

        if let Err(e) = writer.finish().await {
            warn!("Task {}: log flush failed: {}", self.token, e);
        }

        let summary = match summarize_log(&self.log_path).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                debug!("Task {}: summary generation failed: {}", self.token, e);
                None
            }
        };

        // Status and summary change in the same scheduler turn, so a waiter
        // woken by the transition already finds the summary file.
        self.finalize(exit_code);
        if let Some(summary) = summary {
            // Must stay synchronous: an await here would let waiters run before the file exists
            if let Err(e) = std::fs::write(&self.summary_path, summary) {
                debug!("Task {}: summary write failed: {}", self.token, e);
            }
        }

        if self.cleanup_log {
            if let Err(e) = tokio::fs::remove_file(&self.log_path).await {
                debug!("Task {}: log cleanup failed: {}", self.token, e);
            }
        }
    }

    /// Record the terminal status. A missing record (already consumed by
    /// `halt`) or an already-terminal one is left as is.
    fn finalize(&self, exit_code: Option<i32>) {
        match self.registry.update(&self.token, TaskUpdate::exited(exit_code)) {
            Ok(Some(record)) => info!(
                "Task {} finished: {} (exit code {:?})",
                self.token, record.status, exit_code
            ),
            Ok(None) => debug!("Task {} exited after removal", self.token),
            Err(e) => debug!("Task {} exit not recorded: {}", self.token, e),
        }
    }
}

/// Derive the summary from the log's final content
pub async fn summarize_log(log_path: &Path) -> Result<String> {
    let content = tokio::fs::read(log_path).await?;
    Ok(extract_summary(&String::from_utf8_lossy(&content)))
}
