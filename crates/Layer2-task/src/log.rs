//! Task Log - append-only per-task log file
//!
//! Provides:
//! - Request preamble written before any worker output
//! - A single writer task fed by a channel, so stdout and stderr chunks land
//!   in the file in arrival order without interleaving inside a chunk
//! - Readers used by `await`: line counting and summary-file loading

use chrono::{DateTime, SecondsFormat, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Read buffer size for worker output streams
const CAPTURE_CHUNK_SIZE: usize = 8 * 1024;

/// Header lines written at the top of every task log
#[derive(Debug, Clone)]
pub struct LogPreamble {
    pub role: String,
    pub token: String,
    pub started_at: DateTime<Utc>,

    /// System prompt file and its length in bytes, when one was injected
    pub system_prompt: Option<(PathBuf, usize)>,

    /// Literal invocation, e.g. `kiro-cli chat --no-interactive ...`
    pub command_line: String,
}

impl LogPreamble {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("[REQUEST] Role: {}\n", self.role));
        out.push_str(&format!("[REQUEST] Token: {}\n", self.token));
        out.push_str(&format!(
            "[REQUEST] Started at: {}\n",
            self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        if let Some((path, len)) = &self.system_prompt {
            out.push_str(&format!(
                "[REQUEST] System Prompt: {} ({} chars)\n",
                path.display(),
                len
            ));
        }
        out.push_str(&format!("Command: {}\n\n", self.command_line));
        out
    }
}

/// Cloneable handle for appending chunks to a task log
#[derive(Debug, Clone)]
pub struct LogSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl LogSink {
    /// Queue a chunk. Returns `false` once the writer has stopped.
    pub fn append(&self, chunk: impl Into<Vec<u8>>) -> bool {
        self.tx.send(chunk.into()).is_ok()
    }
}

/// Background writer owning the log file
pub struct TaskLogWriter {
    sink: LogSink,
    handle: JoinHandle<io::Result<()>>,
}

impl TaskLogWriter {
    /// Create or truncate `path` and start the writer task
    pub async fn open(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let log_path = path.to_path_buf();

        let handle = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if let Err(e) = file.write_all(&chunk).await {
                    warn!("Failed to append to {}: {}", log_path.display(), e);
                    return Err(e);
                }
            }
            file.flush().await
        });

        Ok(Self {
            sink: LogSink { tx },
            handle,
        })
    }

    pub fn sink(&self) -> LogSink {
        self.sink.clone()
    }

    /// Drop the writer's own sender and wait until every queued chunk is on
    /// disk. Other `LogSink` clones must be dropped first or this waits for them.
    pub async fn finish(self) -> io::Result<()> {
        drop(self.sink);
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(format!("log writer task failed: {}", e))),
        }
    }
}

/// Copy a worker output stream into the log verbatim, chunk by chunk
pub async fn capture_stream<R>(mut reader: R, sink: LogSink, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CAPTURE_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if !sink.append(&buf[..n]) {
                    break;
                }
            }
            Err(e) => {
                debug!("Worker {} stream closed with error: {}", stream, e);
                break;
            }
        }
    }
}

/// Number of lines in `content`; a trailing newline does not start a new line
pub fn count_lines(content: &[u8]) -> usize {
    if content.is_empty() {
        return 0;
    }
    let newlines = content.iter().filter(|&&b| b == b'\n').count();
    if content.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}

/// Line count of the log file, 0 if it cannot be read
pub async fn read_line_count(path: &Path) -> usize {
    match tokio::fs::read(path).await {
        Ok(content) => count_lines(&content),
        Err(e) => {
            debug!("Cannot read log {}: {}", path.display(), e);
            0
        }
    }
}

/// Summary file content, `None` if it does not exist (yet) or is unreadable
pub async fn read_summary(path: &Path) -> Option<String> {
    tokio::fs::read_to_string(path).await.ok()
}
