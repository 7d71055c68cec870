//! Task Manager - entry point for the client-facing operations
//!
//! Features:
//! - `submit` with immediate / blocking / hybrid waiting
//! - `resume` with a bounded wait per call
//! - `cancel` with graceful-then-forceful termination
//! - Snapshot queries for diagnostics
//!
//! The operations themselves live in `submit`, `resume` and `cancel`; this
//! module owns the shared state they coordinate through.

use crate::executor::{LocalSpawner, OsSignaller, ProcessSignaller, WorkerSpawner};
use crate::launcher::{ArtifactLayout, TaskLauncher};
use crate::registry::TaskRegistry;
use crate::state::TaskStatus;
use crate::task::{TaskRecord, TaskToken};
use autorun_foundation::AutorunConfig;
use std::sync::Arc;
use tracing::debug;

/// Task Manager - owns the registry, launcher and signaller
#[derive(Clone)]
pub struct TaskManager {
    /// Live tasks, shared with the launcher's exit watchers
    registry: Arc<TaskRegistry>,

    launcher: Arc<TaskLauncher>,

    signaller: Arc<dyn ProcessSignaller>,

    config: Arc<AutorunConfig>,
}

impl TaskManager {
    /// Manager that runs workers on this host
    pub fn new(config: AutorunConfig) -> Self {
        let signaller = OsSignaller::new(config.worker.kill_process_group);
        Self::with_backends(config, Arc::new(LocalSpawner::new()), Arc::new(signaller))
    }

    /// Manager with explicit process backends
    pub fn with_backends(
        config: AutorunConfig,
        spawner: Arc<dyn WorkerSpawner>,
        signaller: Arc<dyn ProcessSignaller>,
    ) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let launcher = TaskLauncher::new(
            Arc::clone(&registry),
            spawner,
            ArtifactLayout::new(config.agents_dir.clone()),
            config.worker.clone(),
        )
        .with_cleanup_log(config.cleanup_log);

        debug!(
            "Task manager ready (agents dir {}, worker {})",
            config.agents_dir.display(),
            config.worker.program
        );

        Self {
            registry,
            launcher: Arc::new(launcher),
            signaller,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AutorunConfig {
        &self.config
    }

    pub(crate) fn launcher(&self) -> &TaskLauncher {
        &self.launcher
    }

    pub(crate) fn signaller(&self) -> &dyn ProcessSignaller {
        self.signaller.as_ref()
    }

    /// Record for `token`, if live
    pub fn get(&self, token: &TaskToken) -> Option<TaskRecord> {
        self.registry.get(token)
    }

    /// All live records, oldest first
    pub fn list(&self) -> Vec<TaskRecord> {
        self.registry.list()
    }

    /// Live record counts by status
    pub fn stats(&self) -> TaskStats {
        let mut stats = TaskStats::default();
        for record in self.registry.list() {
            stats.total += 1;
            match record.status {
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }
}

/// Live record counts
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub running: usize,
    /// Finished but not yet consumed by submit or cancel
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}
