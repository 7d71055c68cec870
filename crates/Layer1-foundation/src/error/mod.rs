//! Error types for autorun
//!
//! Every fallible operation in the workspace returns [`Result`].

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// autorun error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Task lookup / lifecycle
    // ========================================================================
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token already exists: {0}")]
    DuplicateToken(String),

    /// Cancel was requested for a task that already finished on its own.
    /// `status` is the lowercase terminal status (`completed` / `failed`).
    #[error("Task already {status}")]
    AlreadyTerminal { token: String, status: String },

    #[error("Invalid transition for task {token}: {from} -> {to}")]
    InvalidTransition {
        token: String,
        from: String,
        to: String,
    },

    // ========================================================================
    // Worker process
    // ========================================================================
    #[error("Failed to launch worker: {0}")]
    Launch(String),

    #[error("Signal delivery failed: {0}")]
    Signal(String),

    // ========================================================================
    // Configuration / input
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // External error conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors a caller can act on (bad token, finished task, bad arguments)
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InvalidToken(_) | Error::AlreadyTerminal { .. } | Error::InvalidInput(_)
        )
    }

    pub fn already_terminal(token: impl Into<String>, status: impl Into<String>) -> Self {
        Error::AlreadyTerminal {
            token: token.into(),
            status: status.into(),
        }
    }

    pub fn invalid_transition(
        token: impl Into<String>,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Error::InvalidTransition {
            token: token.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
