use std::error::Error as StdError;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

type BoxedSource = Box<dyn StdError + Send + Sync>;

/// Which subsystem raised a [`ChaosError`]; decides the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Store,
    Capability,
    Workflow,
    Pipeline,
    Validation,
    Other,
}

impl ErrorKind {
    fn prefix(self) -> &'static str {
        match self {
            ErrorKind::Config => "Configuration error: ",
            ErrorKind::Store => "Store error: ",
            ErrorKind::Capability => "Capability error: ",
            ErrorKind::Workflow => "Workflow error: ",
            ErrorKind::Pipeline => "Pipeline error: ",
            ErrorKind::Validation => "Validation error: ",
            ErrorKind::Other => "",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Config => 2,
            ErrorKind::Store => 4,
            ErrorKind::Capability => 5,
            ErrorKind::Workflow => 6,
            ErrorKind::Pipeline => 7,
            ErrorKind::Validation => 8,
            ErrorKind::Other => 1,
        }
    }
}

/// The unified error type surfaced by chaosforge's public operations.
///
/// Module errors (`StoreError`, `ProcessError`, `PipelineError`, ...) convert into it
/// at the crate boundary, picking a code from [`ErrorCode`].
#[derive(Error, Debug)]
#[error("[E{code:04}] {}{message}", .kind.prefix())]
pub struct ChaosError {
    kind: ErrorKind,
    code: u16,
    message: String,
    /// Store key, failure category, execution ID, stage or field the error concerns
    subject: Option<String>,
    #[source]
    source: Option<BoxedSource>,
}

impl ChaosError {
    fn new(kind: ErrorKind, code: u16, message: impl Into<String>, subject: Option<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            subject,
            source: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, code, message, None)
    }

    pub fn store_with_code(code: u16, message: impl Into<String>, key: Option<String>) -> Self {
        Self::new(ErrorKind::Store, code, message, key)
    }

    pub fn capability_with_code(
        code: u16,
        message: impl Into<String>,
        category: Option<String>,
    ) -> Self {
        Self::new(ErrorKind::Capability, code, message, category)
    }

    pub fn workflow(message: impl Into<String>) -> Self {
        Self::workflow_with_code(ErrorCode::WORKFLOW_GENERIC, message, None)
    }

    pub fn workflow_with_code(
        code: u16,
        message: impl Into<String>,
        execution_id: Option<String>,
    ) -> Self {
        Self::new(ErrorKind::Workflow, code, message, execution_id)
    }

    pub fn pipeline_with_code(code: u16, message: impl Into<String>, stage: Option<String>) -> Self {
        Self::new(ErrorKind::Pipeline, code, message, stage)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::validation_with_code(ErrorCode::VALIDATION_GENERIC, message, None)
    }

    pub fn validation_with_code(
        code: u16,
        message: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        Self::new(ErrorKind::Validation, code, message, field)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, ErrorCode::OTHER_GENERIC, message, None)
    }

    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Append `context` to the message, e.g. the config key that was rejected
    pub fn with_context(mut self, context: impl std::fmt::Display) -> Self {
        self.message = format!("{}: {}", self.message, context);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Message without the code and kind prefix
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::STORE_NOT_FOUND | ErrorCode::WORKFLOW_NOT_FOUND
        )
    }
}

impl From<anyhow::Error> for ChaosError {
    fn from(err: anyhow::Error) -> Self {
        Self::other(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for ChaosError {
    fn from(err: serde_json::Error) -> Self {
        Self::store_with_code(ErrorCode::STORE_SERIALIZATION_ERROR, err.to_string(), None)
            .with_source(err)
    }
}

pub type Result<T> = std::result::Result<T, ChaosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code_and_kind() {
        let err = ChaosError::workflow_with_code(
            ErrorCode::WORKFLOW_NOT_FOUND,
            "execution exec-1 not found",
            Some("exec-1".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "[E5001] Workflow error: execution exec-1 not found"
        );
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::Workflow);
        assert_eq!(err.subject(), Some("exec-1"));
        assert_eq!(err.exit_code(), 6);

        assert_eq!(ChaosError::other("boom").to_string(), "[E9000] boom");
    }

    #[test]
    fn test_with_context_appends() {
        let err = ChaosError::config("bad value").with_context("workflow.retry.max_attempts");
        assert_eq!(err.message(), "bad value: workflow.retry.max_attempts");
        assert_eq!(err.code(), ErrorCode::CONFIG_GENERIC);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_source_is_exposed() {
        let io = std::io::Error::other("disk gone");
        let err = ChaosError::store_with_code(ErrorCode::STORE_IO_ERROR, "write failed", None)
            .with_source(io);
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("disk gone"));
    }
}
