//! Error taxonomy for the execution substrate.
//!
//! Each concern gets its own `thiserror` enum; `CoreError` composes them
//! with `#[error(transparent)]` so callers that only care about the
//! outermost kind can match on one type.

use thiserror::Error;

/// Errors raised by the Process Tracker and Native Launcher.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("process {0} is not tracked")]
    NotTracked(u32),

    #[error("no free port available in range {start}-{end}")]
    NoFreePort { start: u16, end: u16 },

    #[error("failed to kill process {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },
}

/// Errors raised by a Model Server Manager.
#[derive(Debug, Error)]
pub enum ServerError {
    /// No compatible server binary exists for any supported backend; the
    /// caller should fall back to the CLI one-shot worker.
    #[error("no compatible server binary available")]
    NotAvailable,

    #[error("failed to spawn server process: {0}")]
    SpawnFailed(String),

    #[error("server did not become ready within the startup timeout")]
    StartupTimeout,

    #[error("server crashed (exit code: {0:?})")]
    ServerCrashed(Option<i32>),

    #[error("request to server failed: {0}")]
    HttpFailure(String),

    #[error("request aborted by user")]
    Aborted,
}

/// Errors raised while the Graph Runtime executes a job.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node {0} failed: {1}")]
    NodeError(String, String),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Validation(#[from] crate::domain::workflow::ValidationError),
}

/// Errors raised by the Job Queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {0} is not in a cancellable state")]
    InvalidState(String),

    #[error(transparent)]
    Validation(#[from] crate::domain::workflow::ValidationError),

    #[error("failed to persist queue state: {0}")]
    PersistenceFailed(String),
}

/// Canonical top-level error type for the execution substrate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),

    #[error(transparent)]
    Path(#[from] crate::paths::PathError),
}
