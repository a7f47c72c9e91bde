use crate::error::{ChaosError, ErrorCode};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Invalid command line '{line}': {reason}")]
    InvalidCommand { line: String, reason: String },

    #[error("Required environment variable {0} is not set")]
    MissingEnvironment(String),

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No scripted response for: {0}")]
    MockExpectationNotMet(String),
}

impl ProcessError {
    pub fn invalid_command(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

impl From<ProcessError> for ChaosError {
    fn from(err: ProcessError) -> Self {
        let code = match &err {
            ProcessError::CommandNotFound(_)
            | ProcessError::MissingEnvironment(_)
            | ProcessError::Io(_) => ErrorCode::CAPABILITY_SPAWN_FAILED,
            ProcessError::Timeout(_) => ErrorCode::CAPABILITY_TIMEOUT,
            ProcessError::InvalidCommand { .. } => ErrorCode::CONFIG_INVALID_VALUE,
            ProcessError::MockExpectationNotMet(_) => ErrorCode::CAPABILITY_GENERIC,
        };
        ChaosError::capability_with_code(code, err.to_string(), Some("process".to_string()))
            .with_source(err)
    }
}
