//! Task Registry - in-memory token -> record map
//!
//! Every operation is a short synchronous critical section; the lock is
//! never held across an `.await`. Each entry carries a `watch` channel that
//! publishes status changes, so waiters are woken by the transition itself
//! instead of re-reading the map on a timer.

use crate::state::TaskStatus;
use crate::task::{TaskRecord, TaskToken, TaskUpdate};
use autorun_foundation::{Error, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::debug;

struct Entry {
    record: TaskRecord,
    status_tx: watch::Sender<TaskStatus>,
}

/// Registry of live tasks
#[derive(Default)]
pub struct TaskRegistry {
    entries: Mutex<HashMap<TaskToken, Entry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new running task. Fails with `DuplicateToken` if the token
    /// is live; the existing record is left untouched.
    pub fn create(
        &self,
        token: TaskToken,
        role: impl Into<String>,
        pid: u32,
        log_path: impl Into<PathBuf>,
        summary_path: impl Into<PathBuf>,
    ) -> Result<TaskRecord> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&token) {
            return Err(Error::DuplicateToken(token.to_string()));
        }

        let record = TaskRecord::new(token.clone(), role, pid, log_path, summary_path);
        let (status_tx, _) = watch::channel(record.status);
        entries.insert(
            token.clone(),
            Entry {
                record: record.clone(),
                status_tx,
            },
        );

        debug!("Registered task {} (pid {})", token, pid);
        Ok(record)
    }

    pub fn get(&self, token: &TaskToken) -> Option<TaskRecord> {
        self.entries.lock().get(token).map(|e| e.record.clone())
    }

    pub fn contains(&self, token: &TaskToken) -> bool {
        self.entries.lock().contains_key(token)
    }

    /// Merge `update` into the record.
    ///
    /// Returns `Ok(None)` if the token is absent. A status change must be
    /// `running -> terminal`; repeating the current status is a no-op and any
    /// other change fails with `InvalidTransition`.
    pub fn update(&self, token: &TaskToken, update: TaskUpdate) -> Result<Option<TaskRecord>> {
        let mut entries = self.entries.lock();
        let entry = match entries.get_mut(token) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if let Some(next) = update.status {
            let current = entry.record.status;
            if current == next {
                return Ok(Some(entry.record.clone()));
            }
            if !current.can_transition_to(next) {
                return Err(Error::invalid_transition(token.as_str(), current, next));
            }

            entry.record.status = next;
            entry.record.finished_at = Some(Utc::now());
            if update.exit_code.is_some() {
                entry.record.exit_code = update.exit_code;
            }
            entry.status_tx.send_replace(next);
            debug!("Task {}: {} -> {}", token, current, next);
        } else if entry.record.exit_code.is_none() {
            entry.record.exit_code = update.exit_code;
        }

        Ok(Some(entry.record.clone()))
    }

    /// Idempotent removal. Dropping the entry closes its status channel.
    pub fn delete(&self, token: &TaskToken) -> Option<TaskRecord> {
        let removed = self.entries.lock().remove(token).map(|e| e.record);
        if removed.is_some() {
            debug!("Removed task {}", token);
        }
        removed
    }

    /// Status watch for a live task. The receiver observes every later
    /// transition, and the channel closes when the record is deleted.
    pub fn subscribe(&self, token: &TaskToken) -> Option<watch::Receiver<TaskStatus>> {
        self.entries.lock().get(token).map(|e| e.status_tx.subscribe())
    }

    /// Snapshot of all live records
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self
            .entries
            .lock()
            .values()
            .map(|e| e.record.clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
