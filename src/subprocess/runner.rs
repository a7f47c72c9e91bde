use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::error::ProcessError;

/// Bytes kept from each output stream; longer output keeps its tail
pub const MAX_CAPTURED_BYTES: usize = 256 * 1024;

/// Variables every child receives from this process when set. PATH is mandatory.
const BASE_ENV: &[&str] = &["PATH", "TMPDIR", "LANG", "LC_ALL"];

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Complete child environment on top of [`BASE_ENV`]
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ProcessCommand {
    /// Program and arguments joined for log lines
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// Set when either stream exceeded [`MAX_CAPTURED_BYTES`] and lost its head
    pub truncated: bool,
}

impl ProcessOutput {
    /// Stderr followed by stdout, the text failure classification looks at
    pub fn combined_output(&self) -> String {
        match (self.stderr.trim(), self.stdout.trim()) {
            ("", out) => out.to_string(),
            (err, "") => err.to_string(),
            (err, out) => format!("{}\n{}", err, out),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// Non-zero exit code
    Error(i32),
    /// Killed by a signal before exiting
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        *self == ExitStatus::Success
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }

    fn from_std(status: std::process::ExitStatus) -> Self {
        if status.success() {
            return ExitStatus::Success;
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signal(signal);
            }
        }
        ExitStatus::Error(status.code().unwrap_or(1))
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands as tokio child processes with a cleared environment
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    fn prepare(command: &ProcessCommand) -> Result<tokio::process::Command, ProcessError> {
        let mut child = tokio::process::Command::new(&command.program);
        child
            .args(&command.args)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Deploy tools fork workers; a separate group lets a timeout kill them too
        #[cfg(unix)]
        child.process_group(0);

        for name in BASE_ENV {
            match std::env::var(name) {
                Ok(value) => {
                    child.env(name, value);
                }
                Err(_) if *name == "PATH" => {
                    return Err(ProcessError::MissingEnvironment(name.to_string()));
                }
                Err(_) => {}
            }
        }
        child.envs(&command.env);
        if let Some(dir) = &command.working_dir {
            child.current_dir(dir);
        }
        Ok(child)
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let started = Instant::now();
        debug!("Running: {}", command.display());

        let child = Self::prepare(&command)?.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::CommandNotFound(command.program.clone())
            } else {
                ProcessError::Io(e)
            }
        })?;

        // Dropping the child on timeout kills it
        let output = match command.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ProcessError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };

        let (stdout, stdout_cut) = capture(&output.stdout);
        let (stderr, stderr_cut) = capture(&output.stderr);
        let result = ProcessOutput {
            status: ExitStatus::from_std(output.status),
            stdout,
            stderr,
            duration: started.elapsed(),
            truncated: stdout_cut || stderr_cut,
        };

        match result.status {
            ExitStatus::Success => debug!("Finished in {:?}: {}", result.duration, command.display()),
            ExitStatus::Error(code) => {
                debug!("Exited with {} after {:?}: {}", code, result.duration, command.display());
                trace!("Stderr: {}", result.stderr);
            }
            ExitStatus::Signal(signal) => warn!(
                "Killed by signal {} after {:?}: {}",
                signal,
                result.duration,
                command.display()
            ),
        }
        Ok(result)
    }
}

/// Decode a stream, keeping at most the last [`MAX_CAPTURED_BYTES`]
fn capture(bytes: &[u8]) -> (String, bool) {
    let start = bytes.len().saturating_sub(MAX_CAPTURED_BYTES);
    (String::from_utf8_lossy(&bytes[start..]).into_owned(), start > 0)
}
