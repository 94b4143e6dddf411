use std::io;
use thiserror::Error;

/// Result type for process operations
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Errors that can occur while running a job's command
///
/// Each maps onto the diagnostic of a failed job rather than aborting the run.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("empty command")]
    EmptyCommand,

    #[error("cannot locate command {name}: {reason}")]
    NotFound { name: String, reason: String },

    #[error("failed to launch cmd: {0}")]
    SpawnError(#[source] io::Error),

    #[error("cannot construct {0}")]
    MissingPipe(&'static str),

    #[error("{stream}: {source}")]
    ReadError {
        stream: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{stream}: drain task failed: {reason}")]
    DrainTask { stream: &'static str, reason: String },

    #[error("failed to wait for cmd: {0}")]
    WaitError(#[source] io::Error),
}
