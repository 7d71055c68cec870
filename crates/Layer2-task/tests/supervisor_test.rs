//! Supervisor integration tests - scripted workers through the trait seams
//!
//! `cargo test -p autorun-task --test supervisor_test`

use autorun_foundation::{AutorunConfig, Error, Result, WorkerConfig};
use autorun_task::{
    wait_for_terminal, ArtifactLayout, ProcessSignaller, Signal, SubmitResponse, TaskManager, TaskStatus,
    TaskLauncher, TaskRegistry, TaskToken, WaitMode, WaitOutcome, WorkerHandle, WorkerInvocation,
    WorkerSpawner, RETRY_HINT, USAGE_HINT,
};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Script {
    /// Exit with `code` after `delay` unless killed first
    ExitAfter(Duration, Option<i32>),
    /// Run until a signal arrives
    UntilSignalled,
    /// `spawn` itself fails
    FailToSpawn,
}

struct FakeSpawner {
    script: Script,
    output: Vec<u8>,
    next_pid: AtomicU32,
    exits: Mutex<HashMap<u32, oneshot::Sender<Option<i32>>>>,
    invocations: Mutex<Vec<WorkerInvocation>>,
}

impl FakeSpawner {
    fn new(script: Script, output: &str) -> Arc<Self> {
        Arc::new(Self {
            script,
            output: output.as_bytes().to_vec(),
            next_pid: AtomicU32::new(4000),
            exits: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
        })
    }

    /// Simulate death by signal
    fn kill(&self, pid: u32) -> bool {
        match self.exits.lock().remove(&pid) {
            Some(tx) => tx.send(None).is_ok(),
            None => false,
        }
    }

    fn invocations(&self) -> Vec<WorkerInvocation> {
        self.invocations.lock().clone()
    }
}

impl WorkerSpawner for FakeSpawner {
    fn spawn(&self, invocation: &WorkerInvocation) -> Result<WorkerHandle> {
        self.invocations.lock().push(invocation.clone());
        if let Script::FailToSpawn = self.script {
            return Err(Error::Launch(format!("{}: not found", invocation.program)));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.exits.lock().insert(pid, tx);

        let script = self.script;
        let exit = async move {
            match script {
                Script::ExitAfter(delay, code) => tokio::select! {
                    killed = rx => Ok(killed.unwrap_or(None)),
                    _ = tokio::time::sleep(delay) => Ok(code),
                },
                _ => Ok(rx.await.unwrap_or(None)),
            }
        }
        .boxed();

        Ok(WorkerHandle {
            pid,
            stdout: Some(Box::new(std::io::Cursor::new(self.output.clone()))),
            stderr: None,
            exit,
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakeSignaller {
    spawner: Arc<FakeSpawner>,
    graceful_fails: bool,
    forceful_fails: bool,
    calls: Mutex<Vec<(u32, Signal)>>,
}

impl FakeSignaller {
    fn calls(&self) -> Vec<(u32, Signal)> {
        self.calls.lock().clone()
    }
}

impl ProcessSignaller for FakeSignaller {
    fn signal(&self, pid: u32, signal: Signal) -> Result<()> {
        self.calls.lock().push((pid, signal));
        let fails = match signal {
            Signal::Graceful => self.graceful_fails,
            Signal::Forceful => self.forceful_fails,
        };
        if fails {
            return Err(Error::Signal(format!("{:?} to {} rejected", signal, pid)));
        }
        self.spawner.kill(pid);
        Ok(())
    }
}

// ============================================================================
// Fixture
// ============================================================================

const ANSWER: &str = "thinking...\n> \x1b[1mfake answer\x1b[0m\n";

struct Fixture {
    dir: TempDir,
    manager: TaskManager,
    spawner: Arc<FakeSpawner>,
    signaller: Arc<FakeSignaller>,
}

impl Fixture {
    fn agents_dir(&self) -> &Path {
        self.dir.path()
    }

    fn pid_of(&self, token: &TaskToken) -> u32 {
        self.manager.get(token).unwrap().pid
    }
}

struct FixtureBuilder {
    script: Script,
    graceful_fails: bool,
    forceful_fails: bool,
    configure: fn(AutorunConfig) -> AutorunConfig,
}

impl FixtureBuilder {
    fn new(script: Script) -> Self {
        Self {
            script,
            graceful_fails: false,
            forceful_fails: false,
            configure: |config| config,
        }
    }

    fn graceful_fails(mut self) -> Self {
        self.graceful_fails = true;
        self
    }

    fn forceful_fails(mut self) -> Self {
        self.forceful_fails = true;
        self
    }

    fn config(mut self, configure: fn(AutorunConfig) -> AutorunConfig) -> Self {
        self.configure = configure;
        self
    }

    fn build(self) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let spawner = FakeSpawner::new(self.script, ANSWER);
        let signaller = Arc::new(FakeSignaller {
            spawner: Arc::clone(&spawner),
            graceful_fails: self.graceful_fails,
            forceful_fails: self.forceful_fails,
            calls: Mutex::new(Vec::new()),
        });

        let config = AutorunConfig::default()
            .agents_dir(dir.path())
            .worker(WorkerConfig::new("fake-worker").args(["chat", "--no-interactive"]))
            .hybrid_wait_ms(2_000)
            .resume_wait_ms(300);
        let config = (self.configure)(config);

        let manager = TaskManager::with_backends(
            config,
            Arc::clone(&spawner) as Arc<dyn WorkerSpawner>,
            Arc::clone(&signaller) as Arc<dyn ProcessSignaller>,
        );

        Fixture {
            dir,
            manager,
            spawner,
            signaller,
        }
    }
}

fn started_token(response: &SubmitResponse) -> TaskToken {
    response
        .token()
        .cloned()
        .unwrap_or_else(|| panic!("expected a running handle, got {:?}", response))
}

async fn wait_until_gone(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

// ============================================================================
// Submit
// ============================================================================

#[tokio::test]
async fn test_hybrid_finishes_within_budget() {
    let fx = FixtureBuilder::new(Script::ExitAfter(Duration::from_millis(10), Some(0))).build();

    let response = fx
        .manager
        .submit("reviewer", "analyze the code", WaitMode::Hybrid)
        .await
        .unwrap();

    let log_path = match &response {
        SubmitResponse::Finished { status, log_path } => {
            assert_eq!(*status, TaskStatus::Completed);
            log_path.clone()
        }
        other => panic!("expected finished, got {:?}", other),
    };
    assert!(response.token().is_none());

    // Consumed: the record is gone
    assert!(fx.manager.list().is_empty());

    let history = fx.agents_dir().join("reviewer").join("data").join("history");
    assert_eq!(log_path.parent().unwrap(), history);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.starts_with("[REQUEST] Role: reviewer\n"));
    assert!(log.contains("Command: fake-worker chat --no-interactive analyze the code\n\n"));
    assert!(log.ends_with(ANSWER));

    let summary_path = PathBuf::from(log_path.to_string_lossy().replace(".log", ".summary.md"));
    assert_eq!(std::fs::read_to_string(summary_path).unwrap(), "> fake answer");

    let invocations = fx.spawner.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].program, "fake-worker");
    assert_eq!(
        invocations[0].args,
        vec!["chat", "--no-interactive", "analyze the code"]
    );
}

#[tokio::test]
async fn test_hybrid_budget_elapses_returns_handle() {
    let fx = FixtureBuilder::new(Script::UntilSignalled)
        .config(|c| c.hybrid_wait_ms(50))
        .build();

    let response = fx
        .manager
        .submit("reviewer", "analyze code", WaitMode::Hybrid)
        .await
        .unwrap();

    match &response {
        SubmitResponse::Started {
            status,
            summary,
            usage,
            ..
        } => {
            assert_eq!(*status, TaskStatus::Running);
            assert_eq!(summary, "analyze code started");
            assert_eq!(usage, USAGE_HINT);
        }
        other => panic!("expected handle, got {:?}", other),
    }

    let token = started_token(&response);
    assert!(fx.manager.get(&token).unwrap().is_running());
}

#[tokio::test]
async fn test_immediate_returns_without_waiting() {
    let fx = FixtureBuilder::new(Script::ExitAfter(Duration::from_millis(200), Some(0))).build();
    let question = "q".repeat(80);

    let response = fx
        .manager
        .submit("default", &question, WaitMode::Immediate)
        .await
        .unwrap();

    match &response {
        SubmitResponse::Started { summary, .. } => {
            assert_eq!(summary, &format!("{}... started", "q".repeat(50)));
        }
        other => panic!("expected handle, got {:?}", other),
    }
    let token = started_token(&response);
    assert_eq!(fx.manager.get(&token).unwrap().status, TaskStatus::Running);
}

#[tokio::test]
async fn test_blocking_waits_for_failure() {
    let fx = FixtureBuilder::new(Script::ExitAfter(Duration::from_millis(30), Some(3))).build();

    let response = fx
        .manager
        .submit("default", "do the thing", WaitMode::Blocking)
        .await
        .unwrap();

    assert_eq!(response.status(), TaskStatus::Failed);
    assert!(response.token().is_none());
    assert!(fx.manager.list().is_empty());
}

#[tokio::test]
async fn test_blocking_ceiling_falls_back_to_handle() {
    let fx = FixtureBuilder::new(Script::UntilSignalled)
        .config(|c| c.blocking_wait_ceiling_ms(Some(50)))
        .build();

    let response = fx
        .manager
        .submit("default", "long job", WaitMode::Blocking)
        .await
        .unwrap();

    let token = started_token(&response);
    assert!(fx.manager.get(&token).is_some());
}

#[tokio::test]
async fn test_system_prompt_is_prepended() {
    let fx = FixtureBuilder::new(Script::ExitAfter(Duration::from_millis(10), Some(0))).build();
    let role_dir = fx.agents_dir().join("architect");
    std::fs::create_dir_all(&role_dir).unwrap();
    std::fs::write(role_dir.join("system-prompt.md"), "You are terse.").unwrap();

    let response = fx
        .manager
        .submit("architect", "design it", WaitMode::Hybrid)
        .await
        .unwrap();

    let invocation = fx.spawner.invocations().pop().unwrap();
    assert_eq!(
        invocation.args.last().unwrap(),
        "You are terse.\n---\ndesign it"
    );

    let log_path = match response {
        SubmitResponse::Finished { log_path, .. } => log_path,
        other => panic!("expected finished, got {:?}", other),
    };
    let log = std::fs::read_to_string(log_path).unwrap();
    assert!(log.contains("[REQUEST] System Prompt: "));
    assert!(log.contains("system-prompt.md (14 chars)\n"));
}

#[tokio::test]
async fn test_system_prompt_length_counts_bytes() {
    let fx = FixtureBuilder::new(Script::ExitAfter(Duration::from_millis(10), Some(0))).build();
    let role_dir = fx.agents_dir().join("writer");
    std::fs::create_dir_all(&role_dir).unwrap();
    std::fs::write(role_dir.join("system-prompt.md"), "Résumé").unwrap();

    let response = fx
        .manager
        .submit("writer", "draft it", WaitMode::Hybrid)
        .await
        .unwrap();

    let log_path = match response {
        SubmitResponse::Finished { log_path, .. } => log_path,
        other => panic!("expected finished, got {:?}", other),
    };
    let log = std::fs::read_to_string(log_path).unwrap();
    assert!(log.contains("system-prompt.md (8 chars)\n"));
}

#[tokio::test]
async fn test_invalid_input_spawns_nothing() {
    let fx = FixtureBuilder::new(Script::UntilSignalled).build();

    for role in ["", "..", "a/b"] {
        let err = fx
            .manager
            .submit(role, "question", WaitMode::Immediate)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "role {:?}", role);
    }

    let err = fx
        .manager
        .submit("default", "   ", WaitMode::Immediate)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    assert!(fx.spawner.invocations().is_empty());
    assert!(fx.manager.list().is_empty());
}

#[tokio::test]
async fn test_spawn_failure_creates_no_record() {
    let fx = FixtureBuilder::new(Script::FailToSpawn).build();

    let err = fx
        .manager
        .submit("default", "question", WaitMode::Hybrid)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Launch(_)));
    assert!(fx.manager.list().is_empty());

    let history = fx.agents_dir().join("default").join("data").join("history");
    let log = std::fs::read_dir(&history)
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.path().extension().is_some_and(|x| x == "log"))
        .unwrap();
    let content = std::fs::read_to_string(log.path()).unwrap();
    assert!(content.contains("[ERROR] Failed to launch worker"));
}

#[tokio::test]
async fn test_cleanup_log_removes_log_after_summary() {
    let fx = FixtureBuilder::new(Script::ExitAfter(Duration::from_millis(10), Some(0)))
        .config(|c| c.cleanup_log(true))
        .build();

    let response = fx
        .manager
        .submit("default", "question", WaitMode::Hybrid)
        .await
        .unwrap();

    let log_path = match response {
        SubmitResponse::Finished { log_path, .. } => log_path,
        other => panic!("expected finished, got {:?}", other),
    };
    assert!(wait_until_gone(&log_path).await);

    let summary_path = PathBuf::from(log_path.to_string_lossy().replace(".log", ".summary.md"));
    assert_eq!(std::fs::read_to_string(summary_path).unwrap(), "> fake answer");
}

// ============================================================================
// Resume
// ============================================================================

#[tokio::test]
async fn test_resume_repeatedly_then_terminal() {
    let fx = FixtureBuilder::new(Script::UntilSignalled)
        .config(|c| c.hybrid_wait_ms(20).resume_wait_ms(50))
        .build();

    let response = fx
        .manager
        .submit("default", "slow question", WaitMode::Hybrid)
        .await
        .unwrap();
    let token = started_token(&response);

    for _ in 0..3 {
        let resumed = fx.manager.resume(&token).await.unwrap();
        assert_eq!(resumed.status, TaskStatus::Running);
        assert!(resumed.timeout);
        assert_eq!(resumed.message.as_deref(), Some(RETRY_HINT));
        assert!(resumed.summary.is_none());
        assert!(fx.manager.get(&token).is_some());
    }

    // Worker dies; wait for the exit watcher to record it
    let pid = fx.pid_of(&token);
    assert!(fx.spawner.kill(pid));
    let outcome = wait_for_terminal(fx.manager.registry(), &token, Some(Duration::from_secs(5))).await;
    assert_eq!(outcome, WaitOutcome::Finished(TaskStatus::Failed));

    for _ in 0..2 {
        let resumed = fx.manager.resume(&token).await.unwrap();
        assert_eq!(resumed.status, TaskStatus::Failed);
        assert!(!resumed.timeout);
        assert!(resumed.message.is_none());
        assert_eq!(resumed.summary.as_deref(), Some("> fake answer"));
        assert!(resumed.line_count >= 6);
    }

    // Resume never consumes the record
    assert_eq!(fx.manager.get(&token).unwrap().status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_resume_wakes_on_exit() {
    let fx = FixtureBuilder::new(Script::ExitAfter(Duration::from_millis(100), Some(0)))
        .config(|c| c.resume_wait_ms(5_000))
        .build();

    let response = fx
        .manager
        .submit("default", "question", WaitMode::Immediate)
        .await
        .unwrap();
    let token = started_token(&response);

    let resumed = fx.manager.resume(&token).await.unwrap();
    assert_eq!(resumed.status, TaskStatus::Completed);
    assert!(!resumed.timeout);
}

// ============================================================================
// Cancel
// ============================================================================

#[tokio::test]
async fn test_cancel_running_sends_graceful_only() {
    let fx = FixtureBuilder::new(Script::UntilSignalled).build();

    let response = fx
        .manager
        .submit("default", "question", WaitMode::Immediate)
        .await
        .unwrap();
    let token = started_token(&response);
    let pid = fx.pid_of(&token);

    let cancelled = fx.manager.cancel(&token).unwrap();
    assert_eq!(cancelled.token, token);
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert_eq!(cancelled.message, "Task cancelled successfully");

    assert_eq!(fx.signaller.calls(), vec![(pid, Signal::Graceful)]);

    assert!(matches!(
        fx.manager.resume(&token).await,
        Err(Error::InvalidToken(_))
    ));
    assert!(matches!(fx.manager.cancel(&token), Err(Error::InvalidToken(_))));
}

#[tokio::test]
async fn test_cancel_escalates_when_graceful_fails() {
    let fx = FixtureBuilder::new(Script::UntilSignalled)
        .graceful_fails()
        .build();

    let response = fx
        .manager
        .submit("default", "question", WaitMode::Immediate)
        .await
        .unwrap();
    let token = started_token(&response);
    let pid = fx.pid_of(&token);

    fx.manager.cancel(&token).unwrap();
    assert_eq!(
        fx.signaller.calls(),
        vec![(pid, Signal::Graceful), (pid, Signal::Forceful)]
    );
    assert!(fx.manager.get(&token).is_none());
}

#[tokio::test]
async fn test_cancel_swallows_forceful_failure() {
    let fx = FixtureBuilder::new(Script::UntilSignalled)
        .graceful_fails()
        .forceful_fails()
        .build();

    let response = fx
        .manager
        .submit("default", "question", WaitMode::Immediate)
        .await
        .unwrap();
    let token = started_token(&response);

    let cancelled = fx.manager.cancel(&token).unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert_eq!(fx.signaller.calls().len(), 2);
    assert!(fx.manager.list().is_empty());
}

#[tokio::test]
async fn test_cancel_finished_task_is_refused() {
    for (code, expected) in [(Some(0), "completed"), (Some(1), "failed")] {
        let fx = FixtureBuilder::new(Script::ExitAfter(Duration::from_millis(10), code)).build();

        let response = fx
            .manager
            .submit("default", "question", WaitMode::Immediate)
            .await
            .unwrap();
        let token = started_token(&response);
        wait_for_terminal(fx.manager.registry(), &token, None).await;

        match fx.manager.cancel(&token) {
            Err(Error::AlreadyTerminal { status, .. }) => assert_eq!(status, expected),
            other => panic!("expected AlreadyTerminal, got {:?}", other),
        }
        assert!(fx.signaller.calls().is_empty());

        // Refused cancel leaves the record for resume
        let resumed = fx.manager.resume(&token).await.unwrap();
        assert!(!resumed.timeout);
    }
}

#[tokio::test]
async fn test_exit_after_cancel_keeps_cancelled_outcome() {
    let fx = FixtureBuilder::new(Script::UntilSignalled).build();

    let response = fx
        .manager
        .submit("default", "question", WaitMode::Immediate)
        .await
        .unwrap();
    let token = started_token(&response);
    let log_path = fx.manager.get(&token).unwrap().log_path;

    fx.manager.cancel(&token).unwrap();

    // The fake worker dies from the graceful signal; its exit finds no record
    // but the summary is still produced from the log.
    let summary_path = PathBuf::from(log_path.to_string_lossy().replace(".log", ".summary.md"));
    for _ in 0..100 {
        if summary_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(std::fs::read_to_string(summary_path).unwrap(), "> fake answer");
    assert!(fx.manager.get(&token).is_none());
}

#[tokio::test]
async fn test_cancel_while_submit_waits() {
    for mode in [WaitMode::Hybrid, WaitMode::Blocking] {
        let fx = FixtureBuilder::new(Script::UntilSignalled)
            .config(|config| config.hybrid_wait_ms(5_000))
            .build();

        let manager = fx.manager.clone();
        let submit =
            tokio::spawn(async move { manager.submit("default", "long question", mode).await });

        let mut token = None;
        for _ in 0..100 {
            if let Some(record) = fx.manager.list().pop() {
                token = Some(record.token);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let token = token.expect("submit never registered its task");

        fx.manager.cancel(&token).unwrap();

        let response = tokio::time::timeout(Duration::from_secs(2), submit)
            .await
            .expect("submit kept waiting after cancel")
            .unwrap()
            .unwrap();
        match &response {
            SubmitResponse::Finished { status, .. } => assert_eq!(*status, TaskStatus::Cancelled),
            other => panic!("expected finished, got {:?}", other),
        }
        assert!(response.token().is_none());
        assert!(fx.manager.get(&token).is_none());
    }
}

// ============================================================================
// Launcher
// ============================================================================

#[tokio::test]
async fn test_reused_token_starts_with_fresh_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(TaskRegistry::new());
    let layout = ArtifactLayout::new(dir.path());
    let token = TaskToken::from("aaaaaa");
    let summary_path = layout.summary_path("r", &token);

    let first_spawner = FakeSpawner::new(
        Script::ExitAfter(Duration::from_millis(10), Some(0)),
        "> OLD ANSWER\n",
    );
    let first = TaskLauncher::new(
        Arc::clone(&registry),
        first_spawner as Arc<dyn WorkerSpawner>,
        layout.clone(),
        WorkerConfig::new("fake-worker"),
    );
    first.start(&token, "r", "first question").await.unwrap();
    wait_for_terminal(&registry, &token, None).await;
    assert_eq!(std::fs::read_to_string(&summary_path).unwrap(), "> OLD ANSWER");
    registry.delete(&token);

    let second_spawner = FakeSpawner::new(Script::UntilSignalled, "new output only\n");
    let second = TaskLauncher::new(
        Arc::clone(&registry),
        Arc::clone(&second_spawner) as Arc<dyn WorkerSpawner>,
        layout.clone(),
        WorkerConfig::new("fake-worker"),
    );
    let record = second.start(&token, "r", "second question").await.unwrap();

    // Nothing from the first task is visible while the second runs
    assert!(!summary_path.exists());

    assert!(second_spawner.kill(record.pid));
    wait_for_terminal(&registry, &token, None).await;

    let log = std::fs::read_to_string(&record.log_path).unwrap();
    assert!(!log.contains("OLD ANSWER"));
    assert_eq!(log.matches("[REQUEST] Token: aaaaaa").count(), 1);
    assert!(log.starts_with("[REQUEST] Role: r\n"));
    assert!(log.ends_with("new output only\n"));

    let summary = std::fs::read_to_string(&summary_path).unwrap();
    assert!(!summary.contains("OLD ANSWER"));
    assert!(summary.ends_with("new output only"));
}
