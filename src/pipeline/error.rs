use thiserror::Error;

use super::run::Stage;
use crate::error::{ChaosError, ErrorCode};
use crate::store::StoreError;
use crate::subprocess::ProcessError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no source artifact at {0}")]
    SourceMissing(String),

    #[error("source artifact {key} could not be decoded: {reason}")]
    SourceDecode { key: String, reason: String },

    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: Stage, reason: String },

    #[error("invalid pipeline configuration: {0}")]
    Configuration(String),

    #[error("pipeline queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn stage_failed(stage: Stage, reason: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            reason: reason.into(),
        }
    }
}

impl From<PipelineError> for ChaosError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Store(e) => e.into(),
            PipelineError::Process(e) => e.into(),
            PipelineError::Configuration(msg) => {
                ChaosError::config_with_code(ErrorCode::CONFIG_INVALID_VALUE, msg)
            }
            PipelineError::SourceMissing(_) => ChaosError::pipeline_with_code(
                ErrorCode::PIPELINE_SOURCE_MISSING,
                err.to_string(),
                Some(Stage::Source.to_string()),
            ),
            PipelineError::StageFailed { stage, .. } => ChaosError::pipeline_with_code(
                ErrorCode::PIPELINE_STAGE_FAILED,
                err.to_string(),
                Some(stage.to_string()),
            ),
            other => ChaosError::pipeline_with_code(
                ErrorCode::PIPELINE_GENERIC,
                other.to_string(),
                None,
            ),
        }
    }
}
