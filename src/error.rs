// src/error.rs
use thiserror::Error;

/// Result type used throughout the paramrun library
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Custom Error type for the paramrun library
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Task error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for RunnerError {
    fn from(err: tokio::task::JoinError) -> Self {
        RunnerError::Task(err.to_string())
    }
}
