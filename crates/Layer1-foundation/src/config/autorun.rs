//! Autorun Config - supervisor settings
//!
//! Layered load: global (`<config_dir>/autorun/config.json`) then project
//! (`.autorun/config.json`), then the `AUTORUN_AGENTS_DIR` environment override.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Config file name
pub const AUTORUN_CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `agentsDir`
pub const AGENTS_DIR_ENV: &str = "AUTORUN_AGENTS_DIR";

// ============================================================================
// Autorun Config
// ============================================================================

/// Supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutorunConfig {
    /// Root of the per-role directories (`<agentsDir>/<role>/...`)
    #[serde(default = "default_agents_dir")]
    pub agents_dir: PathBuf,

    /// Worker process command line
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Hybrid submit wait budget (ms)
    #[serde(default = "default_hybrid_wait_ms")]
    pub hybrid_wait_ms: u64,

    /// Resume-wait budget per call (ms)
    #[serde(default = "default_resume_wait_ms")]
    pub resume_wait_ms: u64,

    /// Optional ceiling for blocking submits (ms). Unset = wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_wait_ceiling_ms: Option<u64>,

    /// Delete the log file once the summary has been written
    #[serde(default)]
    pub cleanup_log: bool,

    /// Characters of the question echoed back in a `started` summary
    #[serde(default = "default_question_preview_chars")]
    pub question_preview_chars: usize,
}

impl Default for AutorunConfig {
    fn default() -> Self {
        Self {
            agents_dir: default_agents_dir(),
            worker: WorkerConfig::default(),
            hybrid_wait_ms: default_hybrid_wait_ms(),
            resume_wait_ms: default_resume_wait_ms(),
            blocking_wait_ceiling_ms: None,
            cleanup_log: false,
            question_preview_chars: default_question_preview_chars(),
        }
    }
}

impl AutorunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Global + project merge, then environment override
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<AutorunConfig>(AUTORUN_CONFIG_FILE)? {
                debug!("Loaded global config from {}", global.base_dir().display());
                config.merge(global_config);
            }
        }

        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<AutorunConfig>(AUTORUN_CONFIG_FILE)?
            {
                debug!("Loaded project config from {}", project.base_dir().display());
                config.merge(project_config);
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Load a single explicit file (no layering)
    pub fn load_from(path: &Path) -> Result<Self> {
        let dir = path
            .parent()
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;

        let mut config: AutorunConfig = JsonStore::new(dir).load(name)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(AGENTS_DIR_ENV) {
            if !dir.is_empty() {
                self.agents_dir = PathBuf::from(dir);
            }
        }
    }

    /// Later layers override fields they set away from the default
    pub fn merge(&mut self, other: AutorunConfig) {
        if other.agents_dir != default_agents_dir() {
            self.agents_dir = other.agents_dir;
        }
        self.worker.merge(other.worker);
        if other.hybrid_wait_ms != default_hybrid_wait_ms() {
            self.hybrid_wait_ms = other.hybrid_wait_ms;
        }
        if other.resume_wait_ms != default_resume_wait_ms() {
            self.resume_wait_ms = other.resume_wait_ms;
        }
        if other.blocking_wait_ceiling_ms.is_some() {
            self.blocking_wait_ceiling_ms = other.blocking_wait_ceiling_ms;
        }
        self.cleanup_log = self.cleanup_log || other.cleanup_log;
        if other.question_preview_chars != default_question_preview_chars() {
            self.question_preview_chars = other.question_preview_chars;
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn hybrid_wait(&self) -> Duration {
        Duration::from_millis(self.hybrid_wait_ms)
    }

    pub fn resume_wait(&self) -> Duration {
        Duration::from_millis(self.resume_wait_ms)
    }

    pub fn blocking_wait_ceiling(&self) -> Option<Duration> {
        self.blocking_wait_ceiling_ms.map(Duration::from_millis)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn agents_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.agents_dir = dir.into();
        self
    }

    pub fn worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn hybrid_wait_ms(mut self, ms: u64) -> Self {
        self.hybrid_wait_ms = ms;
        self
    }

    pub fn resume_wait_ms(mut self, ms: u64) -> Self {
        self.resume_wait_ms = ms;
        self
    }

    pub fn blocking_wait_ceiling_ms(mut self, ms: Option<u64>) -> Self {
        self.blocking_wait_ceiling_ms = ms;
        self
    }

    pub fn cleanup_log(mut self, cleanup: bool) -> Self {
        self.cleanup_log = cleanup;
        self
    }
}

// ============================================================================
// Worker Config
// ============================================================================

/// How to invoke the worker. The task input is appended as the last argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Signal the worker's whole process group instead of the single pid
    #[serde(default = "default_true")]
    pub kill_process_group: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            kill_process_group: true,
        }
    }
}

impl WorkerConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            kill_process_group: true,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn merge(&mut self, other: WorkerConfig) {
        if other.program != default_program() {
            self.program = other.program;
        }
        if other.args != default_args() {
            self.args = other.args;
        }
        if !other.kill_process_group {
            self.kill_process_group = false;
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn default_agents_dir() -> PathBuf {
    PathBuf::from("subagents")
}

fn default_program() -> String {
    "kiro-cli".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "chat".to_string(),
        "--no-interactive".to_string(),
        "--trust-all-tools".to_string(),
    ]
}

fn default_hybrid_wait_ms() -> u64 {
    10_000
}

fn default_resume_wait_ms() -> u64 {
    55_000
}

fn default_question_preview_chars() -> usize {
    50
}

fn default_true() -> bool {
    true
}
