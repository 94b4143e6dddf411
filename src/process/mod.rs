//! Running one job's command as an external process
//!
//! This module resolves the program, spawns it with both output streams
//! captured, and turns whatever happened into an [`ExecutionResult`]. Failures
//! never escape as errors: they become FAILURE results with a diagnostic.

mod command;
mod error;

pub use command::{CapturedOutput, Command, ProcessHandle, normalize_exit_status, resolve_program};
pub use error::{ProcessError, ProcessResult};

use std::ffi::OsString;
use std::path::Path;

use log::debug;

use crate::result::{ExecutionResult, Outcome, RETURNCODE_FAILURE};

/// Something that can run a rendered argument vector
#[async_trait::async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Run `argv` to completion and report what happened
    async fn execute(&self, argv: Vec<String>) -> ExecutionResult;
}

/// Runs commands as real subprocesses
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    /// Directories searched for programs named without a path
    search_path: Option<OsString>,
}

impl ProcessExecutor {
    /// Create an executor that searches the current `PATH`
    pub fn new() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Create an executor with an explicit search path
    pub fn with_search_path<S: Into<OsString>>(search_path: S) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    async fn launch(
        &self,
        name: &str,
        program: &Path,
        args: &[String],
    ) -> ProcessResult<CapturedOutput> {
        Command::new(name, program)
            .args(args.iter().cloned())
            .spawn()?
            .capture()
            .await
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, argv: Vec<String>) -> ExecutionResult {
        let Some((name, args)) = argv.split_first() else {
            return ExecutionResult::failure(argv, ProcessError::EmptyCommand.to_string());
        };

        let program = match resolve_program(name, self.search_path.as_deref()) {
            Ok(program) => program,
            Err(e) => {
                debug!("Command {:?} failed: {}", argv, e);
                return ExecutionResult::failure(argv, e.to_string());
            }
        };

        match self.launch(name, &program, args).await {
            Ok(captured) => into_result(argv, &program, captured),
            Err(e) => {
                debug!("Command {:?} failed: {}", argv, e);
                let mut result = ExecutionResult::failure(argv, e.to_string());
                result.prog = Some(program.to_string_lossy().into_owned());
                result
            }
        }
    }
}

/// Build the result for a process that was started
///
/// The outcome stays SUCCESS even if a stream could not be read; those errors
/// only show up in the diagnostic. Only an unknown exit makes it a FAILURE.
pub fn into_result(argv: Vec<String>, program: &Path, captured: CapturedOutput) -> ExecutionResult {
    let mut diagnostics: Vec<String> =
        captured.read_errors.iter().map(ToString::to_string).collect();
    let (returncode, outcome) = match captured.status {
        Ok(status) => (normalize_exit_status(status), Outcome::Success),
        Err(e) => {
            diagnostics.push(e.to_string());
            (RETURNCODE_FAILURE, Outcome::Failure)
        }
    };

    ExecutionResult {
        command: argv,
        returncode,
        stdout: captured.stdout,
        stderr: captured.stderr,
        outcome,
        error: (!diagnostics.is_empty()).then(|| diagnostics.join("; ")),
        worker_id: None,
        prog: Some(program.to_string_lossy().into_owned()),
    }
}
