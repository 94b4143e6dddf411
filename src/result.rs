use serde::{Deserialize, Serialize};

/// Return code reported for jobs whose command was never executed
pub const RETURNCODE_FAILURE: i32 = -4242;

/// Coarse classification of a job's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// The command was started and ran to exit
    Success,
    /// The command could not be run, or the input could not be decoded
    Failure,
    /// Reserved; no code path produces it
    Timeout,
}

/// The structured outcome of attempting to run one job's command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Rendered argument vector
    pub command: Vec<String>,

    /// Normalized exit code, or [`RETURNCODE_FAILURE`]
    pub returncode: i32,

    pub stdout: String,

    pub stderr: String,

    pub outcome: Outcome,

    /// Diagnostic message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Worker that ran the job (debug mode only)
    #[serde(rename = "worker-id", default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<usize>,

    /// Resolved executable path (debug mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prog: Option<String>,
}

impl ExecutionResult {
    /// A failed result for `command` that never produced a process
    pub fn failure<S: Into<String>>(command: Vec<String>, error: S) -> Self {
        Self {
            command,
            returncode: RETURNCODE_FAILURE,
            stdout: String::new(),
            stderr: String::new(),
            outcome: Outcome::Failure,
            error: Some(error.into()),
            worker_id: None,
            prog: None,
        }
    }

    /// Drop the fields only reported in debug mode
    pub fn without_debug_fields(mut self) -> Self {
        self.worker_id = None;
        self.prog = None;
        self
    }
}
