use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as TokioCommand};

use crate::process::{ProcessError, ProcessResult};
use crate::result::RETURNCODE_FAILURE;

/// Command wrapper for process execution
#[derive(Debug, Clone)]
pub struct Command {
    /// Name the command was invoked as
    name: String,

    /// Resolved program to execute
    program: PathBuf,

    /// Arguments to pass to the program
    args: Vec<String>,
}

impl Command {
    /// Create a new command for an already resolved program
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, program: P) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.args.push(arg.into());
        }
        self
    }

    /// Start the command with stdin closed and both output streams piped
    pub fn spawn(&self) -> ProcessResult<ProcessHandle> {
        debug!("Spawning command: {} {:?}", self.program.display(), self.args);

        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        cmd.arg0(&self.name);

        let child = cmd.spawn().map_err(ProcessError::SpawnError)?;

        Ok(ProcessHandle {
            child,
            program: self.name.clone(),
        })
    }
}

/// Everything captured from a finished process
#[derive(Debug)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,

    /// Read failures on either stream, stdout first
    pub read_errors: Vec<ProcessError>,

    /// Exit status, or why it could not be collected
    pub status: ProcessResult<ExitStatus>,
}

/// Handle to a running process
pub struct ProcessHandle {
    /// Child process
    child: Child,

    /// Program name
    program: String,
}

impl ProcessHandle {
    /// Drain stdout and stderr concurrently to EOF, then wait for exit
    ///
    /// The streams are read by two independent tasks; reading them one after
    /// the other deadlocks once the child fills the pipe nobody is reading.
    pub async fn capture(mut self) -> ProcessResult<CapturedOutput> {
        let Some(stdout) = self.child.stdout.take() else {
            self.abandon().await;
            return Err(ProcessError::MissingPipe("stdout"));
        };
        let Some(stderr) = self.child.stderr.take() else {
            self.abandon().await;
            return Err(ProcessError::MissingPipe("stderr"));
        };

        let stdout_task = tokio::spawn(drain("stdout", stdout));
        let stderr_task = tokio::spawn(drain("stderr", stderr));
        let (stdout, stderr) = tokio::join!(stdout_task, stderr_task);

        let mut read_errors = Vec::new();
        let stdout = collect("stdout", stdout, &mut read_errors);
        let stderr = collect("stderr", stderr, &mut read_errors);

        for e in &read_errors {
            warn!("[{}] {}", self.program, e);
        }

        let status = self.child.wait().await.map_err(ProcessError::WaitError);
        match &status {
            Ok(status) => debug!("[{}] exited: {}", self.program, status),
            Err(e) => warn!("[{}] {}", self.program, e),
        }

        Ok(CapturedOutput {
            stdout,
            stderr,
            read_errors,
            status,
        })
    }

    /// Kill and reap a process whose output can no longer be captured
    async fn abandon(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("[{}] failed to kill process: {}", self.program, e);
        }
    }
}

async fn drain<S>(stream: &'static str, mut pipe: S) -> (String, Option<ProcessError>)
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let error = pipe
        .read_to_end(&mut buf)
        .await
        .err()
        .map(|source| ProcessError::ReadError { stream, source });
    trace!("Drained {} bytes from {}", buf.len(), stream);
    (String::from_utf8_lossy(&buf).into_owned(), error)
}

fn collect(
    stream: &'static str,
    joined: Result<(String, Option<ProcessError>), tokio::task::JoinError>,
    errors: &mut Vec<ProcessError>,
) -> String {
    match joined {
        Ok((text, error)) => {
            errors.extend(error);
            text
        }
        Err(e) => {
            errors.push(ProcessError::DrainTask {
                stream,
                reason: e.to_string(),
            });
            String::new()
        }
    }
}

/// Resolve a program name the way a shell would
///
/// Names containing a path separator are used as given; anything else is
/// looked up in each directory of `search_path`.
pub fn resolve_program(name: &str, search_path: Option<&OsStr>) -> ProcessResult<PathBuf> {
    let not_found = |reason: &str| ProcessError::NotFound {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(not_found("executable file not found in $PATH"));
    }

    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(name);
        return if is_executable(&path) {
            Ok(path)
        } else {
            Err(not_found("no such executable file"))
        };
    }

    let search_path = search_path.ok_or_else(|| not_found("$PATH is not set"))?;
    for dir in std::env::split_paths(search_path) {
        if dir.as_os_str().is_empty() {
            continue;
        }

        let candidate = dir.join(name);
        if is_executable(&candidate) {
            trace!("Resolved {} to {}", name, candidate.display());
            return Ok(candidate);
        }
    }

    Err(not_found("executable file not found in $PATH"))
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Collapse a wait status into a plain exit code
///
/// Processes killed by a signal report `128 + signal`, as shells do.
pub fn normalize_exit_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    RETURNCODE_FAILURE
}
